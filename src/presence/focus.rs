use super::snapshot::PresenceHandle;
use super::title::is_generic_shell_title;
use crate::config::PresenceConfig;
use crate::platform::WindowSystem;
use anyhow::Result;
use std::sync::Arc;

/// Brings a session's surfaces to the front on behalf of the session list
pub struct FocusController {
    windows: Arc<dyn WindowSystem>,
    presence: PresenceHandle,
    auto_hide: bool,
    generic_shell_titles: Vec<String>,
}

impl FocusController {
    pub fn new(windows: Arc<dyn WindowSystem>, presence: PresenceHandle, config: &PresenceConfig) -> Self {
        Self {
            windows,
            presence,
            auto_hide: config.auto_hide,
            generic_shell_titles: config.generic_shell_titles.clone(),
        }
    }

    /// Focus the surface behind activity label `index` of a session.
    ///
    /// Returns `Ok(false)` when the index does not resolve to a live window.
    /// With auto-hide on, every other session's surfaces are minimised
    /// first, except windows still showing a generic shell title: nothing
    /// could bring those back to their session later.
    pub fn focus(&self, session_id: &str, index: usize) -> Result<bool> {
        let snapshot = self.presence.snapshot();
        let Some(target) = snapshot.target(session_id, index) else {
            return Ok(false);
        };
        if !self.windows.is_window(target.handle) {
            return Ok(false);
        }

        if self.auto_hide {
            let others = snapshot
                .sessions
                .iter()
                .filter(|(id, _)| id.as_str() != session_id)
                .flat_map(|(_, presence)| presence.activity.iter());
            for entry in others {
                let handle = entry.target.handle;
                if handle == target.handle {
                    continue;
                }
                let title = self
                    .windows
                    .window_title(handle)
                    .ok()
                    .or_else(|| entry.target.title.clone())
                    .unwrap_or_default();
                if is_generic_shell_title(&title, &self.generic_shell_titles) {
                    continue;
                }
                if let Err(e) = self.windows.minimize(handle) {
                    tracing::debug!("Could not minimise {}: {:#}", handle, e);
                }
            }
        }

        self.windows.focus(target.handle)?;
        self.presence.acknowledge(session_id);
        Ok(true)
    }
}
