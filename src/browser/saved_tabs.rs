//! Tab addresses captured from a workspace, relaunched when it reopens
//! (`workspace-tabs.json`, session id -> addresses).

use crate::util::{read_json_or_default, write_json_locked};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct SavedTabs {
    path: PathBuf,
}

impl SavedTabs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> BTreeMap<String, Vec<String>> {
        read_json_or_default(&self.path)
    }

    pub fn load(&self, session_id: &str) -> Vec<String> {
        self.read().remove(session_id).unwrap_or_default()
    }

    /// Replace a session's saved tabs; an empty list removes the entry
    pub fn save(&self, session_id: &str, urls: Vec<String>) -> Result<()> {
        let mut all = self.read();
        if urls.is_empty() {
            all.remove(session_id);
        } else {
            all.insert(session_id.to_string(), urls);
        }
        write_json_locked(&self.path, &all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let saved = SavedTabs::new(temp_dir.path().join("workspace-tabs.json"));
        assert!(saved.load("s1").is_empty());

        saved
            .save("s1", vec!["https://docs.rs".to_string()])
            .unwrap();
        saved.save("s2", vec!["https://crates.io".to_string()]).unwrap();
        assert_eq!(saved.load("s1"), vec!["https://docs.rs".to_string()]);

        saved.save("s1", Vec::new()).unwrap();
        assert!(saved.load("s1").is_empty());
        assert_eq!(saved.load("s2").len(), 1);
    }
}
