//! Restart-survivable status cache (`status.json`).

use crate::data::SessionStatus;
use crate::util::{read_json_or_default, write_json_locked};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// Last write time of the log the status was read from
    pub last_observed_utc: DateTime<Utc>,
    pub status: SessionStatus,
}

pub struct StatusCache {
    path: PathBuf,
}

impl StatusCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records observed within the staleness window; older ones are dropped
    /// rather than trusted.
    pub fn load(&self, now: DateTime<Utc>, staleness: Duration) -> HashMap<String, StatusRecord> {
        let mut records: HashMap<String, StatusRecord> = read_json_or_default(&self.path);
        let total = records.len();
        records.retain(|_, record| now - record.last_observed_utc <= staleness);
        if records.len() < total {
            tracing::debug!("Discarded {} stale status record(s)", total - records.len());
        }
        records
    }

    pub fn save(&self, records: &HashMap<String, StatusRecord>) -> Result<()> {
        write_json_locked(&self.path, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_discards_stale_records() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StatusCache::new(temp_dir.path().join("status.json"));
        let now = Utc::now();

        let mut records = HashMap::new();
        records.insert(
            "fresh".to_string(),
            StatusRecord {
                last_observed_utc: now - Duration::minutes(5),
                status: SessionStatus::Working,
            },
        );
        records.insert(
            "stale".to_string(),
            StatusRecord {
                last_observed_utc: now - Duration::minutes(31),
                status: SessionStatus::Working,
            },
        );
        cache.save(&records).unwrap();

        let loaded = cache.load(now, Duration::minutes(30));
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["fresh"].status, SessionStatus::Working);
    }

    #[test]
    fn test_serialized_shape() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StatusCache::new(temp_dir.path().join("status.json"));
        let mut records = HashMap::new();
        records.insert(
            "s1".to_string(),
            StatusRecord {
                last_observed_utc: Utc::now(),
                status: SessionStatus::IdleSilent,
            },
        );
        cache.save(&records).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(cache.path()).unwrap()).unwrap();
        assert_eq!(raw["s1"]["status"], "IdleSilent");
        assert!(raw["s1"]["lastObservedUtc"].is_string());
    }

    #[test]
    fn test_missing_cache_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StatusCache::new(temp_dir.path().join("status.json"));
        assert!(cache.load(Utc::now(), Duration::minutes(30)).is_empty());
    }
}
