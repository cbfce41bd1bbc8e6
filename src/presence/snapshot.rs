//! Immutable per-refresh presence snapshots and the handle interactive code
//! uses to read them and to queue tracking requests.

use super::handle_cache::EditorSurface;
use crate::data::{Indicator, SurfaceKind, TrackedSurface, WindowHandle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

/// What clicking an activity label focuses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusTarget {
    pub kind: SurfaceKind,
    pub handle: WindowHandle,
    /// Title at scan time, for title-discovered windows
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub label: String,
    pub target: FocusTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPresence {
    pub display_name: String,
    /// Ordered: matched windows, editors, file browser, browser workspace.
    /// The index into this list is the focus index.
    pub activity: Vec<ActivityEntry>,
    pub indicator: Indicator,
    pub surfaces: Vec<TrackedSurface>,
}

impl SessionPresence {
    pub fn activity_text(&self) -> String {
        self.activity
            .iter()
            .map(|entry| entry.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceSnapshot {
    pub generation: u64,
    pub sessions: BTreeMap<String, SessionPresence>,
}

/// Per-refresh payload for the session list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPayload {
    pub activity_text_by_session_id: BTreeMap<String, String>,
    pub display_name_by_session_id: BTreeMap<String, String>,
    pub status_icon_by_session_id: BTreeMap<String, String>,
}

impl PresenceSnapshot {
    pub fn activity_text_by_session(&self) -> BTreeMap<String, String> {
        self.sessions
            .iter()
            .map(|(id, s)| (id.clone(), s.activity_text()))
            .collect()
    }

    pub fn display_names(&self) -> BTreeMap<String, String> {
        self.sessions
            .iter()
            .map(|(id, s)| (id.clone(), s.display_name.clone()))
            .collect()
    }

    pub fn indicators(&self) -> BTreeMap<String, Indicator> {
        self.sessions
            .iter()
            .map(|(id, s)| (id.clone(), s.indicator))
            .collect()
    }

    pub fn target(&self, session_id: &str, index: usize) -> Option<&FocusTarget> {
        self.sessions
            .get(session_id)?
            .activity
            .get(index)
            .map(|entry| &entry.target)
    }

    pub fn ui_payload(&self) -> UiPayload {
        UiPayload {
            activity_text_by_session_id: self.activity_text_by_session(),
            display_name_by_session_id: self.display_names(),
            status_icon_by_session_id: self
                .sessions
                .iter()
                .map(|(id, s)| (id.clone(), s.indicator.icon(self.generation).to_string()))
                .collect(),
        }
    }
}

/// Latest published snapshot. Readers clone the `Arc` and never block a
/// refresh for longer than the swap.
#[derive(Clone, Default)]
pub struct SnapshotHandle(Arc<RwLock<Arc<PresenceSnapshot>>>);

impl SnapshotHandle {
    pub fn latest(&self) -> Arc<PresenceSnapshot> {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn publish(&self, snapshot: PresenceSnapshot) -> Arc<PresenceSnapshot> {
        let snapshot = Arc::new(snapshot);
        match self.0.write() {
            Ok(mut guard) => *guard = snapshot.clone(),
            Err(poisoned) => *poisoned.into_inner() = snapshot.clone(),
        }
        snapshot
    }
}

/// Requests applied at the start of the next refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRequest {
    Editor {
        session_id: String,
        surface: EditorSurface,
    },
    FileBrowser {
        session_id: String,
        handle: WindowHandle,
    },
    Workspace {
        session_id: String,
        handle: WindowHandle,
    },
    /// The user looked at the session; stop ringing until it works again
    Acknowledge { session_id: String },
}

/// Shared between the refresh loop (sole writer of tracking state) and
/// interactive callers
#[derive(Clone, Default)]
pub struct PresenceHandle {
    snapshot: SnapshotHandle,
    inbox: Arc<Mutex<Vec<TrackRequest>>>,
}

impl PresenceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<PresenceSnapshot> {
        self.snapshot.latest()
    }

    pub(crate) fn snapshots(&self) -> &SnapshotHandle {
        &self.snapshot
    }

    pub fn request(&self, request: TrackRequest) {
        match self.inbox.lock() {
            Ok(mut inbox) => inbox.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
    }

    pub fn track_editor(&self, session_id: &str, surface: EditorSurface) {
        self.request(TrackRequest::Editor {
            session_id: session_id.to_string(),
            surface,
        });
    }

    pub fn track_file_browser(&self, session_id: &str, handle: WindowHandle) {
        self.request(TrackRequest::FileBrowser {
            session_id: session_id.to_string(),
            handle,
        });
    }

    pub fn track_workspace(&self, session_id: &str, handle: WindowHandle) {
        self.request(TrackRequest::Workspace {
            session_id: session_id.to_string(),
            handle,
        });
    }

    pub fn acknowledge(&self, session_id: &str) {
        self.request(TrackRequest::Acknowledge {
            session_id: session_id.to_string(),
        });
    }

    pub(crate) fn drain(&self) -> Vec<TrackRequest> {
        match self.inbox.lock() {
            Ok(mut inbox) => std::mem::take(&mut *inbox),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}
