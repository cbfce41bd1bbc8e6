//! Test utilities and fixtures for lookout tests

#![allow(dead_code)]

use lookout::browser::{AnchorDocument, BrowserLocator};
use lookout::config::Config;
use lookout::data::Session;
use lookout::platform::memory::MemoryDesktop;
use lookout::platform::Desktop;
use lookout::presence::{HandleCache, PresenceTracker, TerminalCache};
use lookout::status::{StatusCache, StatusDetector};
use serde_json::{json, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A temp data/session-state layout plus an in-memory desktop
pub struct Fixture {
    pub dir: TempDir,
    pub desktop: Arc<MemoryDesktop>,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.session_state_dir = Some(dir.path().join("session-state"));
        config.paths.data_dir = Some(dir.path().join("data"));
        fs::create_dir_all(dir.path().join("session-state")).unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();

        Self {
            dir,
            desktop: Arc::new(MemoryDesktop::new()),
            config,
        }
    }

    pub fn session_state_dir(&self) -> PathBuf {
        self.config.session_state_dir()
    }

    pub fn desktop(&self) -> Desktop {
        Desktop::memory(self.desktop.clone())
    }

    /// Create a session directory with a summary
    pub fn session(&self, id: &str, summary: &str) -> Session {
        let dir = self.session_state_dir().join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("session.json"),
            json!({ "summary": summary }).to_string(),
        )
        .unwrap();
        Session::new(id).with_summary(summary)
    }

    pub fn append_event(&self, id: &str, line: &str) {
        let dir = self.session_state_dir().join(id);
        fs::create_dir_all(&dir).unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("events.jsonl"))
            .unwrap();
        writeln!(file, "{}", line).unwrap();
    }

    pub fn detector(&self) -> Arc<StatusDetector> {
        Arc::new(StatusDetector::new(
            self.session_state_dir(),
            StatusCache::new(self.config.status_cache_path().unwrap()),
            self.config.polling.staleness(),
        ))
    }

    pub fn locator(&self) -> Arc<BrowserLocator> {
        Arc::new(
            BrowserLocator::new(
                self.desktop.clone(),
                AnchorDocument::new(self.config.anchor_document_path().unwrap()),
            )
            .with_poll_interval(Duration::from_millis(10)),
        )
    }

    pub fn tracker(&self, detector: Arc<StatusDetector>) -> PresenceTracker {
        PresenceTracker::new(
            self.desktop(),
            self.locator(),
            detector,
            HandleCache::new(self.config.handle_cache_path().unwrap()),
            TerminalCache::open(self.config.terminal_cache_path().unwrap()),
            &self.config.presence,
        )
    }
}

pub fn event(kind: &str) -> String {
    json!({ "type": kind, "data": {} }).to_string()
}

pub fn event_with(kind: &str, data: Value) -> String {
    json!({ "type": kind, "data": data }).to_string()
}
