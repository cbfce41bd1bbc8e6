//! Restart-survivable cache of window handles.
//!
//! Handles are written after every refresh and read once at startup, so
//! editors, file browsers and browser workspaces opened before a restart are
//! tracked again before the first full scan. A cached handle is a claim, not
//! a fact: nothing here is trusted until it has been re-checked against the
//! OS, and entries that fail the check are dropped without complaint.

use crate::data::{ProcessId, SurfaceKind, WindowHandle};
use crate::platform::{Desktop, WindowSystem};
use crate::util::{read_json_or_default, write_json_locked};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedHandleEntry {
    pub session_id: String,
    pub kind: SurfaceKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_hint: Option<String>,
    pub handle: WindowHandle,
}

pub struct HandleCache {
    path: PathBuf,
}

impl HandleCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Candidate entries exactly as last written. Not liveness-checked.
    pub fn load(&self) -> Vec<CachedHandleEntry> {
        read_json_or_default(&self.path)
    }

    /// Entries whose handle still resolves to a window
    pub fn load_live(&self, windows: &dyn WindowSystem) -> Vec<CachedHandleEntry> {
        let entries = self.load();
        let total = entries.len();
        let live: Vec<_> = entries
            .into_iter()
            .filter(|e| windows.is_window(e.handle))
            .collect();
        if live.len() < total {
            tracing::debug!(
                "Dropped {} dead handle(s) from {}",
                total - live.len(),
                self.path.display()
            );
        }
        live
    }

    pub fn save(&self, entries: &[CachedHandleEntry]) -> Result<()> {
        write_json_locked(&self.path, entries)
    }
}

/// An editor/IDE window launched for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSurface {
    pub name: String,
    /// Launcher pid; `0` once the window has been re-associated by folder
    pub process_id: ProcessId,
    pub handle: WindowHandle,
    pub folder_hint: Option<String>,
}

/// Outcome of re-checking a tracked editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassociation {
    Alive,
    /// Handle died but the process owns another top-level window
    MovedToProcessWindow(WindowHandle),
    /// Process is gone but a window titled after the folder exists
    MovedByFolder(WindowHandle),
    Lost,
}

impl EditorSurface {
    /// Re-check this editor against the OS.
    ///
    /// Order: the handle itself; another window of the same live process
    /// (an IDE that replaced its launcher window after loading a solution);
    /// a window whose title names the hinted folder (launcher shims that exit
    /// right after spawning the real application). `claimed` windows already
    /// belong to something else and are never adopted.
    pub fn reassociate(&self, desktop: &Desktop, claimed: &HashSet<WindowHandle>) -> Reassociation {
        if desktop.windows.is_window(self.handle) {
            return Reassociation::Alive;
        }

        if self.process_id != 0 && desktop.processes.is_alive(self.process_id) {
            let replacement = desktop
                .windows
                .windows_for_process(self.process_id)
                .into_iter()
                .find(|h| *h != self.handle && !claimed.contains(h));
            if let Some(handle) = replacement {
                return Reassociation::MovedToProcessWindow(handle);
            }
        }

        if let Some(folder) = self.folder_hint.as_deref().and_then(folder_name) {
            if let Some(handle) = desktop.windows.find_window_by_title(folder, claimed) {
                return Reassociation::MovedByFolder(handle);
            }
        }

        Reassociation::Lost
    }

    /// Apply a re-association. Returns `false` when the editor is gone.
    pub fn apply(&mut self, outcome: Reassociation) -> bool {
        match outcome {
            Reassociation::Alive => true,
            Reassociation::MovedToProcessWindow(handle) => {
                self.handle = handle;
                true
            }
            Reassociation::MovedByFolder(handle) => {
                self.handle = handle;
                self.process_id = 0;
                true
            }
            Reassociation::Lost => false,
        }
    }

    pub fn to_cache_entry(&self, session_id: &str) -> CachedHandleEntry {
        CachedHandleEntry {
            session_id: session_id.to_string(),
            kind: SurfaceKind::Editor,
            name: self.name.clone(),
            folder_hint: self.folder_hint.clone(),
            handle: self.handle,
        }
    }
}

/// Last non-empty component of a Windows or Unix path
pub fn folder_name(hint: &str) -> Option<&str> {
    hint.rsplit(|c: char| c == '/' || c == '\\')
        .map(str::trim)
        .find(|part| !part.is_empty())
}
