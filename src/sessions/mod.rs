//! The session list and the external "actively resumed" registry.
//!
//! Sessions live as directories under the agent's session-state directory:
//!
//! ```text
//! ~/.copilot/session-state/
//! ├── <sessionId>/
//! │   ├── session.json   <- optional {summary, cwd}
//! │   └── events.jsonl   <- append-only event log
//! └── ...
//! ```

use crate::data::{ProcessId, Session};
use crate::platform::ProcessTable;
use crate::util::read_json_or_default;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SESSION_METADATA_NAME: &str = "session.json";

pub trait SessionSource: Send {
    /// Every known session, reloaded on each call
    fn load_sessions(&self) -> Vec<Session>;

    /// Sessions an external process table considers resumed right now
    fn active_session_ids(&self) -> HashSet<String>;
}

#[derive(Debug, Default, Deserialize)]
struct SessionMetadata {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
}

pub struct SessionStateDir {
    root: PathBuf,
    aliases_path: PathBuf,
    active_registry_path: PathBuf,
    processes: Arc<dyn ProcessTable>,
}

impl SessionStateDir {
    pub fn new(
        root: impl Into<PathBuf>,
        aliases_path: impl Into<PathBuf>,
        active_registry_path: impl Into<PathBuf>,
        processes: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            root: root.into(),
            aliases_path: aliases_path.into(),
            active_registry_path: active_registry_path.into(),
            processes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SessionSource for SessionStateDir {
    fn load_sessions(&self) -> Vec<Session> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("No session state at {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };
        let aliases: HashMap<String, String> = read_json_or_default(&self.aliases_path);

        let mut sessions: Vec<Session> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let id = entry.file_name().to_str()?.to_string();
                let metadata: SessionMetadata =
                    read_json_or_default(&entry.path().join(SESSION_METADATA_NAME));
                Some(Session {
                    alias: aliases.get(&id).cloned(),
                    summary: metadata.summary,
                    working_directory: metadata.cwd,
                    id,
                })
            })
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }

    fn active_session_ids(&self) -> HashSet<String> {
        let registry: BTreeMap<String, ProcessId> = read_json_or_default(&self.active_registry_path);
        registry
            .into_iter()
            .filter(|(_, pid)| self.processes.is_alive(*pid))
            .map(|(id, _)| id)
            .collect()
    }
}
