//! Which sessions currently have a terminal open, persisted for the
//! session list (`terminals.json`, session id -> owning pid or 0).

use crate::data::ProcessId;
use crate::util::{read_json_or_default, write_json_locked};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct TerminalCache {
    path: PathBuf,
    entries: BTreeMap<String, ProcessId>,
}

impl TerminalCache {
    /// Load the persisted map; unreadable files start empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_json_or_default(&path);
        Self { path, entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, ProcessId> {
        &self.entries
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }

    /// Add sessions seen with a terminal this pass and drop the rest.
    ///
    /// Known sessions keep their recorded pid. Returns whether anything
    /// changed.
    pub fn reconcile(&mut self, seen: &BTreeMap<String, ProcessId>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|id, _| seen.contains_key(id));
        let mut changed = self.entries.len() != before;

        for (id, pid) in seen {
            if !self.entries.contains_key(id) {
                self.entries.insert(id.clone(), *pid);
                changed = true;
            }
        }
        changed
    }

    pub fn save(&self) -> Result<()> {
        write_json_locked(&self.path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seen(pairs: &[(&str, ProcessId)]) -> BTreeMap<String, ProcessId> {
        pairs.iter().map(|(id, pid)| (id.to_string(), *pid)).collect()
    }

    #[test]
    fn test_reconcile_adds_and_removes() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = TerminalCache::open(temp_dir.path().join("terminals.json"));

        assert!(cache.reconcile(&seen(&[("a", 10), ("b", 0)])));
        assert!(!cache.reconcile(&seen(&[("a", 11), ("b", 0)])));
        assert_eq!(cache.entries()["a"], 10);

        assert!(cache.reconcile(&seen(&[("b", 0)])));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_persists_across_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("terminals.json");

        let mut cache = TerminalCache::open(&path);
        cache.reconcile(&seen(&[("a", 10)]));
        cache.save().unwrap();

        let reopened = TerminalCache::open(&path);
        assert_eq!(reopened.entries(), &seen(&[("a", 10)]));
    }
}
