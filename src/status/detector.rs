//! Per-session working/idle state machine over the sessions' event logs.

use super::cache::{StatusCache, StatusRecord};
use super::event::classify_line;
use super::tail::read_last_line;
use crate::data::SessionStatus;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const EVENT_LOG_NAME: &str = "events.jsonl";

/// A status change across the working / not-working boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub session_id: String,
    pub previous: SessionStatus,
    pub current: SessionStatus,
}

impl StatusTransition {
    pub fn became_working(&self) -> bool {
        self.current.is_working()
    }
}

pub struct StatusDetector {
    session_state_dir: PathBuf,
    staleness: Duration,
    cache: StatusCache,
    records: Mutex<HashMap<String, StatusRecord>>,
}

impl StatusDetector {
    /// Seed from the persisted cache, minus records past the staleness window
    pub fn new(session_state_dir: impl Into<PathBuf>, cache: StatusCache, staleness: Duration) -> Self {
        let records = cache.load(Utc::now(), staleness);
        Self {
            session_state_dir: session_state_dir.into(),
            staleness,
            cache,
            records: Mutex::new(records),
        }
    }

    pub fn session_state_dir(&self) -> &Path {
        &self.session_state_dir
    }

    pub fn log_path(&self, session_id: &str) -> PathBuf {
        self.session_state_dir.join(session_id).join(EVENT_LOG_NAME)
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, StatusRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Classify the log's last line. A log last written before the
    /// staleness window is `Unknown` whatever it says.
    fn read_log(&self, session_id: &str, now: DateTime<Utc>) -> Option<StatusRecord> {
        let path = self.log_path(session_id);
        let modified: DateTime<Utc> = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified.into(),
            Err(e) => {
                tracing::trace!("No event log for {}: {}", session_id, e);
                return None;
            }
        };

        let status = if now - modified > self.staleness {
            SessionStatus::Unknown
        } else {
            match read_last_line(&path) {
                Ok(Some(line)) => classify_line(&line),
                Ok(None) => SessionStatus::Unknown,
                Err(e) => {
                    tracing::debug!("Failed to tail {}: {:#}", path.display(), e);
                    return None;
                }
            }
        };

        Some(StatusRecord {
            last_observed_utc: modified,
            status,
        })
    }

    fn effective(&self, record: &StatusRecord, now: DateTime<Utc>) -> SessionStatus {
        if record.status.is_working() && now - record.last_observed_utc > self.staleness {
            SessionStatus::IdleSilent
        } else {
            record.status
        }
    }

    /// Re-read a session's log and update the cache.
    ///
    /// `Unknown` classifications leave the cached status alone. A transition
    /// is returned only when the session crosses the working boundary.
    pub fn observe(&self, session_id: &str) -> Option<StatusTransition> {
        self.observe_at(session_id, Utc::now())
    }

    pub fn observe_at(&self, session_id: &str, now: DateTime<Utc>) -> Option<StatusTransition> {
        let record = self.read_log(session_id, now)?;
        if !record.status.is_authoritative() {
            return None;
        }

        let mut records = self.records();
        let previous = records
            .get(session_id)
            .map(|r| self.effective(r, now))
            .unwrap_or_default();
        records.insert(session_id.to_string(), record);

        if previous.is_working() == record.status.is_working() {
            return None;
        }
        tracing::debug!(
            "Session {} {:?} -> {:?}",
            session_id,
            previous,
            record.status
        );
        Some(StatusTransition {
            session_id: session_id.to_string(),
            previous,
            current: record.status,
        })
    }

    /// Read every session's log once without raising transitions
    pub fn prime<'a>(&self, session_ids: impl IntoIterator<Item = &'a str>) {
        let mut primed = 0;
        for id in session_ids {
            self.observe(id);
            primed += 1;
        }
        tracing::debug!("Primed status for {} session(s)", primed);
    }

    pub fn status(&self, session_id: &str) -> SessionStatus {
        self.status_at(session_id, Utc::now())
    }

    /// Cached status with `Working` decayed to `IdleSilent` once its log has
    /// gone quiet for longer than the staleness window
    pub fn status_at(&self, session_id: &str, now: DateTime<Utc>) -> SessionStatus {
        self.records()
            .get(session_id)
            .map(|r| self.effective(r, now))
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<String, SessionStatus> {
        let now = Utc::now();
        self.records()
            .iter()
            .map(|(id, r)| (id.clone(), self.effective(r, now)))
            .collect()
    }

    /// Persist the cache with decayed statuses written as such
    pub fn save(&self) -> Result<()> {
        let now = Utc::now();
        let records: HashMap<String, StatusRecord> = self
            .records()
            .iter()
            .map(|(id, r)| {
                let record = StatusRecord {
                    last_observed_utc: r.last_observed_utc,
                    status: self.effective(r, now),
                };
                (id.clone(), record)
            })
            .collect();
        self.cache.save(&records)
    }
}
