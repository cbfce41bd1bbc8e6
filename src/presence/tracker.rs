//! The refresh cycle: correlate the desktop against the session list and
//! publish one immutable snapshot per pass.
//!
//! The tracker is the only writer of tracking state. Interactive callers go
//! through a [`PresenceHandle`]: they read the latest snapshot and queue
//! requests that are applied at the start of the next refresh.

use super::handle_cache::{CachedHandleEntry, EditorSurface, HandleCache};
use super::matcher::{KnownNames, MatchedWindow, WindowCategory, WindowMatcher};
use super::snapshot::{
    ActivityEntry, FocusTarget, PresenceHandle, PresenceSnapshot, SessionPresence, TrackRequest,
};
use super::terminals::TerminalCache;
use crate::browser::{BrowserLocator, WorkspaceMarker};
use crate::config::PresenceConfig;
use crate::data::{
    Indicator, ProcessId, Session, SessionStatus, SurfaceKind, TrackedSurface, WindowHandle,
};
use crate::platform::Desktop;
use crate::status::{StatusDetector, StatusTransition};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub const FILE_BROWSER_LABEL: &str = "File Explorer";
pub const WORKSPACE_LABEL: &str = "Browser";

pub struct PresenceTracker {
    desktop: Desktop,
    matcher: WindowMatcher,
    locator: Arc<BrowserLocator>,
    detector: Arc<StatusDetector>,
    handle_cache: HandleCache,
    terminals: TerminalCache,
    working_prefixes: Vec<String>,
    presence: PresenceHandle,

    first_cycle: bool,
    generation: u64,
    editors: HashMap<String, Vec<EditorSurface>>,
    file_browsers: HashMap<String, WindowHandle>,
    workspaces: HashMap<String, WindowHandle>,
    /// Sessions that must not ring until they are seen working again
    suppressed: HashSet<String>,
    was_working: HashSet<String>,
}

impl PresenceTracker {
    pub fn new(
        desktop: Desktop,
        locator: Arc<BrowserLocator>,
        detector: Arc<StatusDetector>,
        handle_cache: HandleCache,
        terminals: TerminalCache,
        config: &PresenceConfig,
    ) -> Self {
        Self {
            desktop,
            matcher: WindowMatcher::default(),
            locator,
            detector,
            handle_cache,
            terminals,
            working_prefixes: config.working_title_prefixes.clone(),
            presence: PresenceHandle::new(),
            first_cycle: true,
            generation: 0,
            editors: HashMap::new(),
            file_browsers: HashMap::new(),
            workspaces: HashMap::new(),
            suppressed: HashSet::new(),
            was_working: HashSet::new(),
        }
    }

    pub fn handle(&self) -> PresenceHandle {
        self.presence.clone()
    }

    pub fn detector(&self) -> &Arc<StatusDetector> {
        &self.detector
    }

    pub fn locator(&self) -> &Arc<BrowserLocator> {
        &self.locator
    }

    /// Run one refresh pass and publish its snapshot.
    ///
    /// `active` is the set of sessions the external process registry
    /// considers resumed; `transitions` are detector transitions delivered
    /// since the previous pass.
    pub fn refresh(
        &mut self,
        sessions: &[Session],
        active: &HashSet<String>,
        transitions: &[StatusTransition],
    ) -> Arc<PresenceSnapshot> {
        let session_ids: HashSet<&str> = sessions.iter().map(|s| s.id.as_str()).collect();

        self.apply_requests();
        for transition in transitions {
            if transition.became_working() {
                self.suppressed.remove(&transition.session_id);
            }
        }

        let known = known_names(sessions);
        let mut matched = self.matcher.scan(self.desktop.windows.as_ref(), &known);
        matched.retain(|id, _| session_ids.contains(id.as_str()));

        self.reconcile_terminals(&matched);

        if self.first_cycle {
            self.merge_cached_handles(&session_ids);
        }
        self.forget_unknown_sessions(&session_ids);

        let mut claimed: HashSet<WindowHandle> =
            matched.values().flatten().map(|w| w.handle).collect();
        claimed.extend(self.file_browsers.values().copied());
        claimed.extend(self.workspaces.values().copied());
        self.reassociate_editors(&mut claimed);
        self.drop_dead_file_browsers();
        self.save_handle_cache();

        self.check_workspaces(sessions);
        let seeding = self.first_cycle;
        self.first_cycle = false;

        let mut snapshot = PresenceSnapshot {
            generation: self.generation + 1,
            sessions: BTreeMap::new(),
        };
        for session in sessions {
            let windows = matched.get(&session.id).map(Vec::as_slice).unwrap_or(&[]);
            let indicator = self.indicator(&session.id, windows, active, seeding);
            let (activity, surfaces) = self.activity(&session.id, windows);
            snapshot.sessions.insert(
                session.id.clone(),
                SessionPresence {
                    display_name: session.display_name(),
                    activity,
                    indicator,
                    surfaces,
                },
            );
        }

        self.generation = snapshot.generation;
        self.presence.snapshots().publish(snapshot)
    }

    fn apply_requests(&mut self) {
        for request in self.presence.drain() {
            match request {
                TrackRequest::Editor {
                    session_id,
                    surface,
                } => {
                    let editors = self.editors.entry(session_id).or_default();
                    if !editors.iter().any(|e| e.handle == surface.handle) {
                        editors.push(surface);
                    }
                }
                TrackRequest::FileBrowser { session_id, handle } => {
                    self.file_browsers.insert(session_id, handle);
                }
                TrackRequest::Workspace { session_id, handle } => {
                    self.workspaces.insert(session_id, handle);
                }
                TrackRequest::Acknowledge { session_id } => {
                    self.suppressed.insert(session_id);
                }
            }
        }
    }

    fn reconcile_terminals(&mut self, matched: &HashMap<String, Vec<MatchedWindow>>) {
        let seen: BTreeMap<String, ProcessId> = matched
            .iter()
            .filter_map(|(id, windows)| {
                let terminal = windows
                    .iter()
                    .find(|w| w.category == WindowCategory::Terminal)?;
                Some((id.clone(), terminal.process_id.unwrap_or(0)))
            })
            .collect();

        if self.terminals.reconcile(&seen) {
            if let Err(e) = self.terminals.save() {
                tracing::warn!("Failed to save terminal cache: {:#}", e);
            }
        }
    }

    /// Seed tracking from the handle cache, keeping only entries whose
    /// handle still resolves and that nothing fresher already covers
    fn merge_cached_handles(&mut self, session_ids: &HashSet<&str>) {
        let entries = self.handle_cache.load_live(self.desktop.windows.as_ref());
        if entries.is_empty() {
            return;
        }

        let owners: HashMap<WindowHandle, ProcessId> = match self.desktop.windows.top_level_windows() {
            Ok(listing) => listing
                .into_iter()
                .filter_map(|w| Some((w.handle, w.process_id?)))
                .collect(),
            Err(e) => {
                tracing::debug!("Window enumeration failed while seeding cache: {:#}", e);
                HashMap::new()
            }
        };

        let mut merged = 0;
        for entry in entries {
            if !session_ids.contains(entry.session_id.as_str()) {
                continue;
            }
            let fresh = match entry.kind {
                SurfaceKind::Editor => {
                    let editors = self.editors.entry(entry.session_id).or_default();
                    let fresh = !editors.iter().any(|e| e.handle == entry.handle);
                    if fresh {
                        editors.push(EditorSurface {
                            name: entry.name,
                            process_id: owners.get(&entry.handle).copied().unwrap_or(0),
                            handle: entry.handle,
                            folder_hint: entry.folder_hint,
                        });
                    }
                    fresh
                }
                SurfaceKind::FileBrowser => {
                    let slot = self.file_browsers.entry(entry.session_id);
                    let fresh = matches!(slot, std::collections::hash_map::Entry::Vacant(_));
                    slot.or_insert(entry.handle);
                    fresh
                }
                SurfaceKind::BrowserWorkspace => {
                    let slot = self.workspaces.entry(entry.session_id);
                    let fresh = matches!(slot, std::collections::hash_map::Entry::Vacant(_));
                    slot.or_insert(entry.handle);
                    fresh
                }
                SurfaceKind::Terminal | SurfaceKind::AgentWindow => false,
            };
            if fresh {
                merged += 1;
            }
        }
        tracing::debug!("Restored {} cached handle(s)", merged);
    }

    fn forget_unknown_sessions(&mut self, session_ids: &HashSet<&str>) {
        self.editors.retain(|id, _| session_ids.contains(id.as_str()));
        self.file_browsers.retain(|id, _| session_ids.contains(id.as_str()));
        self.workspaces.retain(|id, _| session_ids.contains(id.as_str()));
    }

    fn reassociate_editors(&mut self, claimed: &mut HashSet<WindowHandle>) {
        claimed.extend(self.editors.values().flatten().map(|e| e.handle));

        let desktop = &self.desktop;
        for (session_id, editors) in self.editors.iter_mut() {
            let tracked = std::mem::take(editors);
            for mut editor in tracked {
                let previous = editor.handle;
                let outcome = editor.reassociate(desktop, claimed);
                if !editor.apply(outcome) {
                    tracing::debug!(
                        "Evicted editor {} ({}) for {}",
                        editor.name,
                        previous,
                        session_id
                    );
                    continue;
                }
                if editor.handle != previous {
                    tracing::debug!(
                        "Editor {} for {} moved {} -> {}",
                        editor.name,
                        session_id,
                        previous,
                        editor.handle
                    );
                    claimed.insert(editor.handle);
                }
                if !editors.iter().any(|e| e.handle == editor.handle) {
                    editors.push(editor);
                }
            }
        }
        self.editors.retain(|_, editors| !editors.is_empty());
    }

    fn drop_dead_file_browsers(&mut self) {
        let windows = &self.desktop.windows;
        self.file_browsers.retain(|session_id, handle| {
            let alive = windows.is_window(*handle);
            if !alive {
                tracing::debug!("File browser {} for {} closed", handle, session_id);
            }
            alive
        });
    }

    fn save_handle_cache(&self) {
        let mut entries: Vec<CachedHandleEntry> = Vec::new();
        for (session_id, editors) in &self.editors {
            entries.extend(editors.iter().map(|e| e.to_cache_entry(session_id)));
        }
        for (session_id, handle) in &self.file_browsers {
            entries.push(CachedHandleEntry {
                session_id: session_id.clone(),
                kind: SurfaceKind::FileBrowser,
                name: FILE_BROWSER_LABEL.to_string(),
                folder_hint: None,
                handle: *handle,
            });
        }
        for (session_id, handle) in &self.workspaces {
            entries.push(CachedHandleEntry {
                session_id: session_id.clone(),
                kind: SurfaceKind::BrowserWorkspace,
                name: session_id.clone(),
                folder_hint: None,
                handle: *handle,
            });
        }
        entries.sort_by(|a, b| (&a.session_id, a.handle).cmp(&(&b.session_id, b.handle)));

        if let Err(e) = self.handle_cache.save(&entries) {
            tracing::warn!("Failed to save handle cache: {:#}", e);
        }
    }

    /// Confirm tracked workspaces through the fast path. The first pass
    /// also bulk-scans for every session without one.
    fn check_workspaces(&mut self, sessions: &[Session]) {
        let locator = &self.locator;
        self.workspaces.retain(|session_id, handle| {
            let alive = locator.check_window(*handle, &WorkspaceMarker::new(session_id.as_str()));
            if !alive {
                tracing::debug!("Workspace for {} is gone", session_id);
            }
            alive
        });

        if !self.first_cycle {
            return;
        }
        let untracked: Vec<String> = sessions
            .iter()
            .filter(|s| !self.workspaces.contains_key(&s.id))
            .map(|s| s.id.clone())
            .collect();
        self.workspaces.extend(self.locator.bulk_scan(&untracked));
    }

    fn indicator(
        &mut self,
        session_id: &str,
        windows: &[MatchedWindow],
        active: &HashSet<String>,
        seeding: bool,
    ) -> Indicator {
        let agent_titles: Vec<&str> = windows
            .iter()
            .filter(|w| w.category == WindowCategory::AgentWindow)
            .map(|w| w.title.as_str())
            .collect();
        let status = self.detector.status(session_id);
        let working = status.is_working()
            || agent_titles.iter().any(|title| self.has_working_prefix(title));

        if working {
            if self.was_working.insert(session_id.to_string()) {
                self.suppressed.remove(session_id);
            }
        } else {
            self.was_working.remove(session_id);
            if status == SessionStatus::IdleSilent {
                self.suppressed.insert(session_id.to_string());
            }
        }

        // Sessions already idle at launch never ring until they work again
        let present = !agent_titles.is_empty() || active.contains(session_id);
        if seeding && present && !working {
            self.suppressed.insert(session_id.to_string());
        }

        if working {
            Indicator::Working
        } else if self.suppressed.contains(session_id) {
            Indicator::Idle
        } else if present {
            Indicator::Bell
        } else {
            Indicator::Idle
        }
    }

    fn has_working_prefix(&self, title: &str) -> bool {
        let title = title.trim_start();
        self.working_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && title.starts_with(prefix.as_str()))
    }

    fn activity(
        &self,
        session_id: &str,
        windows: &[MatchedWindow],
    ) -> (Vec<ActivityEntry>, Vec<TrackedSurface>) {
        let mut activity = Vec::new();
        let mut surfaces = Vec::new();

        for window in windows {
            let kind = match window.category {
                WindowCategory::AgentWindow => {
                    surfaces.push(TrackedSurface::AgentWindow {
                        instance: window.instance,
                        handle: window.handle,
                        title: window.title.clone(),
                    });
                    SurfaceKind::AgentWindow
                }
                WindowCategory::Terminal => {
                    surfaces.push(TrackedSurface::Terminal {
                        instance: window.instance,
                        handle: window.handle,
                    });
                    SurfaceKind::Terminal
                }
            };
            activity.push(entry(&window.label, kind, window.handle, Some(&window.title)));
        }

        for editor in self.editors.get(session_id).into_iter().flatten() {
            activity.push(entry(&editor.name, SurfaceKind::Editor, editor.handle, None));
            surfaces.push(TrackedSurface::EditorProcess {
                name: editor.name.clone(),
                process_id: editor.process_id,
                handle: editor.handle,
                folder_hint: editor.folder_hint.clone(),
            });
        }

        if let Some(handle) = self.file_browsers.get(session_id) {
            activity.push(entry(FILE_BROWSER_LABEL, SurfaceKind::FileBrowser, *handle, None));
            surfaces.push(TrackedSurface::FileBrowserWindow { handle: *handle });
        }

        if let Some(handle) = self.workspaces.get(session_id) {
            activity.push(entry(WORKSPACE_LABEL, SurfaceKind::BrowserWorkspace, *handle, None));
            surfaces.push(TrackedSurface::BrowserWorkspace {
                anchor_marker: WorkspaceMarker::new(session_id).needle(),
                handle: *handle,
            });
        }

        (activity, surfaces)
    }
}

fn entry(label: &str, kind: SurfaceKind, handle: WindowHandle, title: Option<&str>) -> ActivityEntry {
    ActivityEntry {
        label: label.to_string(),
        target: FocusTarget {
            kind,
            handle,
            title: title.map(str::to_string),
        },
    }
}

/// Display name -> id. Names shared by several sessions identify none of
/// them and are left out.
fn known_names(sessions: &[Session]) -> KnownNames {
    let mut names = KnownNames::new();
    let mut ambiguous = HashSet::new();
    for session in sessions {
        let name = session.display_name();
        if names.insert(name.clone(), session.id.clone()).is_some() {
            ambiguous.insert(name);
        }
    }
    for name in ambiguous {
        names.remove(&name);
    }
    names
}
