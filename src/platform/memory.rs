//! Scriptable in-memory desktop.
//!
//! Implements every OS seam over plain data so presence behaviour can be
//! exercised (and replayed) without a display server. Windows are listed in
//! creation order, which stands in for OS z-order.

use super::{BrowserAutomation, BrowserTab, ProcessTable, WindowInfo, WindowSystem};
use crate::data::{ProcessId, WindowHandle};
use anyhow::{anyhow, bail, Result};
use std::collections::HashSet;
use std::sync::Mutex;

type LaunchHandler = Box<dyn Fn(&str) -> Option<Vec<MemoryTab>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTab {
    pub title: String,
    pub address: String,
}

impl MemoryTab {
    pub fn new(title: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryWindow {
    handle: WindowHandle,
    /// `None` makes title reads fail, like a window torn down mid-enumeration
    title: Option<String>,
    process_id: Option<ProcessId>,
    class: Option<String>,
    minimized: bool,
    tabs: Vec<MemoryTab>,
    selected: usize,
}

#[derive(Default)]
struct State {
    windows: Vec<MemoryWindow>,
    processes: HashSet<ProcessId>,
    next_handle: u64,
    focused: Option<WindowHandle>,
    launched: Vec<String>,
    new_tab_requests: Vec<WindowHandle>,
    enumerations: usize,
    tab_scans: usize,
    fail_select_at: Option<usize>,
    selects: usize,
}

#[derive(Default)]
pub struct MemoryDesktop {
    state: Mutex<State>,
    launch_handler: Mutex<Option<LaunchHandler>>,
}

impl MemoryDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn push_window(&self, window: impl FnOnce(WindowHandle) -> MemoryWindow) -> WindowHandle {
        self.with_state(|s| {
            s.next_handle += 1;
            let handle = WindowHandle(0x1000 + s.next_handle);
            s.windows.push(window(handle));
            handle
        })
    }

    /// Open a plain top-level window
    pub fn open_window(&self, title: &str, process_id: Option<ProcessId>) -> WindowHandle {
        if let Some(pid) = process_id {
            self.start_process(pid);
        }
        self.push_window(|handle| MemoryWindow {
            handle,
            title: Some(title.to_string()),
            process_id,
            class: None,
            minimized: false,
            tabs: Vec::new(),
            selected: 0,
        })
    }

    /// Open a browser window; its title follows the selected tab
    pub fn open_browser_window(&self, tabs: Vec<MemoryTab>, selected: usize) -> WindowHandle {
        self.push_window(|handle| MemoryWindow {
            handle,
            title: tabs.get(selected).map(|t| t.title.clone()),
            process_id: None,
            class: Some("browser".to_string()),
            minimized: false,
            tabs,
            selected,
        })
    }

    pub fn set_title(&self, handle: WindowHandle, title: &str) {
        self.with_state(|s| {
            if let Some(w) = s.windows.iter_mut().find(|w| w.handle == handle) {
                w.title = Some(title.to_string());
            }
        });
    }

    /// Make title reads for this window fail while it stays enumerated
    pub fn break_title(&self, handle: WindowHandle) {
        self.with_state(|s| {
            if let Some(w) = s.windows.iter_mut().find(|w| w.handle == handle) {
                w.title = None;
            }
        });
    }

    pub fn close_window(&self, handle: WindowHandle) {
        self.with_state(|s| s.windows.retain(|w| w.handle != handle));
    }

    pub fn start_process(&self, pid: ProcessId) {
        self.with_state(|s| {
            s.processes.insert(pid);
        });
    }

    /// Kill a process; its windows stay open unless closed separately
    pub fn stop_process(&self, pid: ProcessId) {
        self.with_state(|s| {
            s.processes.remove(&pid);
        });
    }

    pub fn is_minimized(&self, handle: WindowHandle) -> bool {
        self.with_state(|s| s.windows.iter().any(|w| w.handle == handle && w.minimized))
    }

    pub fn focused(&self) -> Option<WindowHandle> {
        self.with_state(|s| s.focused)
    }

    pub fn selected_tab(&self, handle: WindowHandle) -> Option<usize> {
        self.with_state(|s| {
            s.windows
                .iter()
                .find(|w| w.handle == handle)
                .map(|w| w.selected)
        })
    }

    pub fn launched_urls(&self) -> Vec<String> {
        self.with_state(|s| s.launched.clone())
    }

    pub fn new_tab_requests(&self) -> Vec<WindowHandle> {
        self.with_state(|s| s.new_tab_requests.clone())
    }

    /// Number of top-level enumerations performed so far
    pub fn enumeration_count(&self) -> usize {
        self.with_state(|s| s.enumerations)
    }

    /// Number of per-window tab (accessibility) scans performed so far
    pub fn tab_scan_count(&self) -> usize {
        self.with_state(|s| s.tab_scans)
    }

    /// Make the n-th (0-based) future `select_tab` call fail
    pub fn fail_select_at(&self, n: usize) {
        self.with_state(|s| {
            s.fail_select_at = Some(s.selects + n);
        });
    }

    /// Decide what a `launch(url)` opens: `Some(tabs)` opens a browser window
    pub fn on_launch<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<Vec<MemoryTab>> + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.launch_handler.lock() {
            *slot = Some(Box::new(handler));
        }
    }

    fn window<R>(&self, handle: WindowHandle, f: impl FnOnce(&mut MemoryWindow) -> R) -> Result<R> {
        self.with_state(|s| {
            s.windows
                .iter_mut()
                .find(|w| w.handle == handle)
                .map(f)
                .ok_or_else(|| anyhow!("window {} does not exist", handle))
        })
    }
}

impl WindowSystem for MemoryDesktop {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.with_state(|s| {
            s.enumerations += 1;
            s.windows
                .iter()
                .map(|w| WindowInfo {
                    handle: w.handle,
                    process_id: w.process_id,
                    class: w.class.clone(),
                })
                .collect()
        }))
    }

    fn window_title(&self, handle: WindowHandle) -> Result<String> {
        self.window(handle, |w| w.title.clone())?
            .ok_or_else(|| anyhow!("title of {} is unreadable", handle))
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        self.with_state(|s| s.windows.iter().any(|w| w.handle == handle))
    }

    fn minimize(&self, handle: WindowHandle) -> Result<()> {
        self.window(handle, |w| w.minimized = true)
    }

    fn focus(&self, handle: WindowHandle) -> Result<()> {
        self.window(handle, |w| w.minimized = false)?;
        self.with_state(|s| s.focused = Some(handle));
        Ok(())
    }
}

impl ProcessTable for MemoryDesktop {
    fn is_alive(&self, pid: ProcessId) -> bool {
        self.with_state(|s| s.processes.contains(&pid))
    }
}

impl BrowserAutomation for MemoryDesktop {
    fn browser_windows(&self) -> Result<Vec<WindowHandle>> {
        Ok(self.with_state(|s| {
            s.enumerations += 1;
            s.windows
                .iter()
                .filter(|w| w.class.as_deref() == Some("browser"))
                .map(|w| w.handle)
                .collect()
        }))
    }

    fn tabs(&self, window: WindowHandle) -> Result<Vec<BrowserTab>> {
        self.with_state(|s| s.tab_scans += 1);
        self.window(window, |w| {
            w.tabs
                .iter()
                .enumerate()
                .map(|(i, t)| BrowserTab {
                    title: t.title.clone(),
                    selected: i == w.selected,
                })
                .collect()
        })
    }

    fn select_tab(&self, window: WindowHandle, index: usize) -> Result<()> {
        let fail = self.with_state(|s| {
            let fail = s.fail_select_at == Some(s.selects);
            s.selects += 1;
            fail
        });
        if fail {
            bail!("tab {} of {} did not accept selection", index, window);
        }

        self.window(window, |w| {
            if index >= w.tabs.len() {
                bail!("tab {} out of range", index);
            }
            w.selected = index;
            w.title = Some(w.tabs[index].title.clone());
            Ok(())
        })?
    }

    fn address(&self, window: WindowHandle) -> Result<String> {
        self.window(window, |w| w.tabs.get(w.selected).map(|t| t.address.clone()))?
            .ok_or_else(|| anyhow!("window {} has no selected tab", window))
    }

    fn new_tab(&self, window: WindowHandle) -> Result<()> {
        self.window(window, |w| {
            w.tabs.push(MemoryTab::new("New Tab", "about:blank"));
            w.selected = w.tabs.len() - 1;
            w.title = Some("New Tab".to_string());
        })?;
        self.with_state(|s| s.new_tab_requests.push(window));
        Ok(())
    }

    fn launch(&self, url: &str) -> Result<()> {
        self.with_state(|s| s.launched.push(url.to_string()));

        let tabs = match self.launch_handler.lock() {
            Ok(handler) => handler.as_ref().and_then(|h| h(url)),
            Err(_) => None,
        };
        if let Some(tabs) = tabs {
            let selected = tabs.len().saturating_sub(1);
            self.open_browser_window(tabs, selected);
        }
        Ok(())
    }
}
