//! File-backed queue of tracking requests.
//!
//! One-shot commands run in their own process, so they cannot reach a
//! running refresh loop's [`PresenceHandle`](super::PresenceHandle). They
//! append here instead, and the loop drains the file at the start of every
//! cycle.

use super::handle_cache::EditorSurface;
use super::snapshot::TrackRequest;
use crate::data::{ProcessId, WindowHandle};
use crate::util::update_json_locked;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueuedRequest {
    #[serde(rename_all = "camelCase")]
    Editor {
        session_id: String,
        name: String,
        process_id: ProcessId,
        handle: WindowHandle,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder_hint: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    FileBrowser {
        session_id: String,
        handle: WindowHandle,
    },
    #[serde(rename_all = "camelCase")]
    Workspace {
        session_id: String,
        handle: WindowHandle,
    },
}

impl From<QueuedRequest> for TrackRequest {
    fn from(request: QueuedRequest) -> Self {
        match request {
            QueuedRequest::Editor {
                session_id,
                name,
                process_id,
                handle,
                folder_hint,
            } => TrackRequest::Editor {
                session_id,
                surface: EditorSurface {
                    name,
                    process_id,
                    handle,
                    folder_hint,
                },
            },
            QueuedRequest::FileBrowser { session_id, handle } => {
                TrackRequest::FileBrowser { session_id, handle }
            }
            QueuedRequest::Workspace { session_id, handle } => {
                TrackRequest::Workspace { session_id, handle }
            }
        }
    }
}

pub struct RequestQueue {
    path: PathBuf,
}

impl RequestQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn push(&self, request: QueuedRequest) -> Result<()> {
        update_json_locked(&self.path, |queue: &mut Vec<QueuedRequest>| {
            queue.push(request)
        })
    }

    /// Take every queued request, oldest first, leaving the file empty
    pub fn drain(&self) -> Result<Vec<QueuedRequest>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        update_json_locked(&self.path, |queue: &mut Vec<QueuedRequest>| {
            std::mem::take(queue)
        })
    }
}
