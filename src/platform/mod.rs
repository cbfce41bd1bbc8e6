//! OS seams: window enumeration, process liveness, browser accessibility.
//!
//! Everything the presence core knows about the desktop comes through these
//! traits. Implementations report failures honestly (`Err`, `false`); the core
//! decides how to degrade.

pub mod command;
pub mod memory;
pub mod process;

use crate::data::{ProcessId, WindowHandle};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// A top-level window as seen during one enumeration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub process_id: Option<ProcessId>,
    /// Window class (WM_CLASS on X11), when the platform exposes one
    pub class: Option<String>,
}

pub trait WindowSystem: Send + Sync {
    /// Enumerate every visible top-level window
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Read a window's title. Fails if the window was torn down.
    fn window_title(&self, handle: WindowHandle) -> Result<String>;

    fn is_window(&self, handle: WindowHandle) -> bool;

    fn minimize(&self, handle: WindowHandle) -> Result<()>;

    fn focus(&self, handle: WindowHandle) -> Result<()>;

    /// Top-level windows owned by a process, in enumeration order
    fn windows_for_process(&self, pid: ProcessId) -> Vec<WindowHandle> {
        match self.top_level_windows() {
            Ok(windows) => windows
                .into_iter()
                .filter(|w| w.process_id == Some(pid))
                .map(|w| w.handle)
                .collect(),
            Err(e) => {
                tracing::debug!("Window enumeration failed looking for pid {}: {:#}", pid, e);
                Vec::new()
            }
        }
    }

    /// First window outside `exclude` whose title contains `fragment`
    /// (case-insensitive)
    fn find_window_by_title(
        &self,
        fragment: &str,
        exclude: &HashSet<WindowHandle>,
    ) -> Option<WindowHandle> {
        let needle = fragment.to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let windows = self.top_level_windows().ok()?;
        windows.into_iter().map(|w| w.handle).find(|handle| {
            !exclude.contains(handle)
                && self
                    .window_title(*handle)
                    .map(|title| title.to_lowercase().contains(&needle))
                    .unwrap_or(false)
        })
    }
}

pub trait ProcessTable: Send + Sync {
    fn is_alive(&self, pid: ProcessId) -> bool;
}

/// One tab of a browser window, as exposed by the accessibility tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTab {
    pub title: String,
    pub selected: bool,
}

/// Accessibility-level control over browser windows.
///
/// Only the selected tab's address is observable, which is why capturing a
/// window's URLs has to select each tab in turn.
pub trait BrowserAutomation: Send + Sync {
    fn browser_windows(&self) -> Result<Vec<WindowHandle>>;

    fn tabs(&self, window: WindowHandle) -> Result<Vec<BrowserTab>>;

    fn select_tab(&self, window: WindowHandle, index: usize) -> Result<()>;

    /// Value of the address field for the currently selected tab
    fn address(&self, window: WindowHandle) -> Result<String>;

    fn new_tab(&self, window: WindowHandle) -> Result<()>;

    fn launch(&self, url: &str) -> Result<()>;
}

/// The OS collaborators handed to the presence core
#[derive(Clone)]
pub struct Desktop {
    pub windows: Arc<dyn WindowSystem>,
    pub processes: Arc<dyn ProcessTable>,
    pub browser: Arc<dyn BrowserAutomation>,
}

impl Desktop {
    /// The X11 desktop (wmctrl/xdotool) with sysinfo-backed process checks
    pub fn system(config: &crate::config::BrowserConfig) -> Self {
        let desktop = Arc::new(command::CommandDesktop::new(config));
        Self {
            windows: desktop.clone(),
            processes: Arc::new(process::SysinfoProcessTable::new()),
            browser: desktop,
        }
    }

    /// Wire every seam to one scriptable in-memory desktop
    pub fn memory(desktop: Arc<memory::MemoryDesktop>) -> Self {
        Self {
            windows: desktop.clone(),
            processes: desktop.clone(),
            browser: desktop,
        }
    }
}
