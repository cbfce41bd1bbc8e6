//! Browser workspace discovery.
//!
//! A session's browser workspace is a browser window holding an anchor tab
//! whose title carries the session's marker. Windows are found by tab
//! inspection rather than window titles, since the window title follows
//! whichever tab the user has selected.

pub mod marker;
pub mod saved_tabs;

pub use marker::{AnchorDocument, WorkspaceMarker};
pub use saved_tabs::SavedTabs;

use crate::data::WindowHandle;
use crate::platform::BrowserAutomation;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const OPEN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct BrowserLocator {
    automation: Arc<dyn BrowserAutomation>,
    anchor: AnchorDocument,
    /// Marker token -> last window the anchor tab was seen in
    remembered: Mutex<HashMap<String, WindowHandle>>,
    poll_interval: Duration,
}

impl BrowserLocator {
    pub fn new(automation: Arc<dyn BrowserAutomation>, anchor: AnchorDocument) -> Self {
        Self {
            automation,
            anchor,
            remembered: Mutex::new(HashMap::new()),
            poll_interval: OPEN_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn remembered(&self, token: &str) -> Option<WindowHandle> {
        self.remembered.lock().ok()?.get(token).copied()
    }

    fn remember(&self, token: &str, window: WindowHandle) {
        if let Ok(mut map) = self.remembered.lock() {
            map.insert(token.to_string(), window);
        }
    }

    fn forget(&self, token: &str, window: WindowHandle) {
        if let Ok(mut map) = self.remembered.lock() {
            if map.get(token) == Some(&window) {
                map.remove(token);
            }
        }
    }

    /// Whether `window` has a tab carrying the marker. Inspection failures
    /// count as "no".
    fn window_has(&self, window: WindowHandle, marker: &WorkspaceMarker) -> bool {
        match self.automation.tabs(window) {
            Ok(tabs) => tabs.iter().any(|tab| marker.matches(&tab.title)),
            Err(e) => {
                tracing::trace!("Tab inspection of {} failed: {:#}", window, e);
                false
            }
        }
    }

    /// Fast path: inspect a single known window
    pub fn check_window(&self, window: WindowHandle, marker: &WorkspaceMarker) -> bool {
        let found = self.window_has(window, marker);
        if found {
            self.remember(&marker.token, window);
        } else {
            self.forget(&marker.token, window);
        }
        found
    }

    /// Find the window holding the marker's anchor tab.
    ///
    /// Re-checks the remembered window first and only falls back to
    /// inspecting every browser window when that fails.
    pub fn is_open(&self, marker: &WorkspaceMarker) -> Option<WindowHandle> {
        if let Some(window) = self.remembered(&marker.token) {
            if self.check_window(window, marker) {
                return Some(window);
            }
        }

        let windows = match self.automation.browser_windows() {
            Ok(windows) => windows,
            Err(e) => {
                tracing::debug!("Browser window enumeration failed: {:#}", e);
                return None;
            }
        };
        let window = windows.into_iter().find(|w| self.window_has(*w, marker))?;
        self.remember(&marker.token, window);
        Some(window)
    }

    /// One enumeration and one tab scan per window, collecting every wanted
    /// marker seen along the way. The first window carrying a token wins.
    pub fn bulk_scan(&self, tokens: &[String]) -> HashMap<String, WindowHandle> {
        let mut found = HashMap::new();
        if tokens.is_empty() {
            return found;
        }
        let wanted: Vec<WorkspaceMarker> = tokens.iter().map(WorkspaceMarker::new).collect();

        let windows = match self.automation.browser_windows() {
            Ok(windows) => windows,
            Err(e) => {
                tracing::debug!("Browser window enumeration failed: {:#}", e);
                return found;
            }
        };

        for window in windows {
            let tabs = match self.automation.tabs(window) {
                Ok(tabs) => tabs,
                Err(e) => {
                    tracing::trace!("Skipping browser window {}: {:#}", window, e);
                    continue;
                }
            };
            for marker in &wanted {
                if found.contains_key(&marker.token) {
                    continue;
                }
                if tabs.iter().any(|tab| marker.matches(&tab.title)) {
                    found.insert(marker.token.clone(), window);
                }
            }
        }

        for (token, window) in &found {
            self.remember(token, *window);
        }
        tracing::debug!(
            "Bulk scan found {} of {} workspace(s)",
            found.len(),
            tokens.len()
        );
        found
    }

    /// Open (or find) the marker's workspace and wait for the anchor tab.
    ///
    /// After the anchor appears a fresh tab is opened next to it so browsing
    /// never navigates the anchor away, then `restore_urls` are relaunched.
    pub async fn open(
        &self,
        marker: &WorkspaceMarker,
        timeout: Duration,
        restore_urls: &[String],
    ) -> Result<WindowHandle> {
        if let Some(window) = self.is_open(marker) {
            return Ok(window);
        }

        self.anchor.ensure()?;
        let url = self.anchor.url(marker);
        tracing::info!("Opening workspace {}", marker.token);
        self.automation.launch(&url)?;

        let deadline = Instant::now() + timeout;
        let window = loop {
            if let Some(window) = self.is_open(marker) {
                break window;
            }
            if Instant::now() >= deadline {
                bail!(
                    "Workspace {} did not appear within {}ms",
                    marker.token,
                    timeout.as_millis()
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        if let Err(e) = self.automation.new_tab(window) {
            tracing::debug!("Could not open a tab beside the anchor: {:#}", e);
        }
        for url in restore_urls {
            if let Err(e) = self.automation.launch(url) {
                tracing::debug!("Could not restore {}: {:#}", url, e);
            }
        }
        Ok(window)
    }

    /// Addresses of every non-anchor tab in `window`.
    ///
    /// Only the selected tab's address is readable, so each tab is selected
    /// in turn and the originally selected tab is re-selected afterwards,
    /// matched by the address it showed before the sweep. The sweep either
    /// completes or returns an error; a partial list is never returned.
    pub fn capture_tab_urls(
        &self,
        window: WindowHandle,
        marker: &WorkspaceMarker,
    ) -> Result<Vec<String>> {
        let tabs = self.automation.tabs(window)?;
        let original = tabs.iter().position(|tab| tab.selected);
        let original_address = self.automation.address(window)?;
        let original_is_anchor = original.is_some_and(|i| marker.matches(&tabs[i].title));

        let mut swept: Vec<(usize, String)> = Vec::new();
        let sweep = (|| -> Result<()> {
            for (index, tab) in tabs.iter().enumerate() {
                if marker.matches(&tab.title) {
                    continue;
                }
                self.automation.select_tab(window, index)?;
                swept.push((index, self.automation.address(window)?));
            }
            Ok(())
        })();

        let restore = if original_is_anchor {
            original
        } else {
            swept
                .iter()
                .find(|(_, address)| *address == original_address)
                .map(|(index, _)| *index)
                .or(original)
        };
        if let Some(index) = restore {
            if let Err(e) = self.automation.select_tab(window, index) {
                tracing::warn!("Could not re-select tab {} of {}: {:#}", index, window, e);
            }
        }

        sweep?;
        Ok(swept.into_iter().map(|(_, address)| address).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryDesktop, MemoryTab};
    use tempfile::TempDir;

    fn anchor_tab(token: &str) -> MemoryTab {
        MemoryTab::new(
            WorkspaceMarker::new(token).tab_title(),
            format!("file:///anchor.html#marker={}", token),
        )
    }

    #[test]
    fn test_forgets_window_after_failed_fast_path() {
        let temp_dir = TempDir::new().unwrap();
        let desktop = Arc::new(MemoryDesktop::new());
        let window = desktop.open_browser_window(vec![anchor_tab("s1")], 0);
        let locator = BrowserLocator::new(
            desktop.clone(),
            AnchorDocument::new(temp_dir.path().join("anchor.html")),
        );
        let marker = WorkspaceMarker::new("s1");

        assert_eq!(locator.is_open(&marker), Some(window));
        desktop.close_window(window);
        assert!(!locator.check_window(window, &marker));
        assert_eq!(locator.remembered("s1"), None);
        assert_eq!(locator.is_open(&marker), None);
    }

    #[test]
    fn test_bulk_scan_ignores_unwanted_tokens() {
        let temp_dir = TempDir::new().unwrap();
        let desktop = Arc::new(MemoryDesktop::new());
        desktop.open_browser_window(vec![anchor_tab("other")], 0);
        let mine = desktop.open_browser_window(vec![anchor_tab("s1")], 0);
        let locator = BrowserLocator::new(
            desktop.clone(),
            AnchorDocument::new(temp_dir.path().join("anchor.html")),
        );

        let found = locator.bulk_scan(&["s1".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found["s1"], mine);
        assert!(locator.bulk_scan(&[]).is_empty());
    }
}
