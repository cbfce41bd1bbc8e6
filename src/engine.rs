//! Wires the session source, status detection and presence tracking into
//! one refresh loop.

use crate::browser::{AnchorDocument, BrowserLocator};
use crate::config::Config;
use crate::data::Session;
use crate::platform::Desktop;
use crate::presence::{
    FocusController, HandleCache, PresenceHandle, PresenceSnapshot, PresenceTracker, RequestQueue,
    TerminalCache,
};
use crate::sessions::{SessionSource, SessionStateDir};
use crate::status::{LogWatcher, StatusCache, StatusDetector, StatusTransition};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

pub struct Engine {
    config: Config,
    desktop: Desktop,
    sessions: Box<dyn SessionSource>,
    detector: Arc<StatusDetector>,
    tracker: PresenceTracker,
    requests: RequestQueue,
    transitions: Receiver<StatusTransition>,
    watcher: LogWatcher,
}

impl Engine {
    /// Start against the configured session-state directory
    pub fn start(config: Config, desktop: Desktop) -> Result<Self> {
        let sessions = SessionStateDir::new(
            config.session_state_dir(),
            config.aliases_path()?,
            config.active_registry_path()?,
            desktop.processes.clone(),
        );
        Self::with_source(config, desktop, Box::new(sessions))
    }

    /// Load the status cache, prime every known session without raising
    /// transitions, then start watching the logs
    pub fn with_source(
        config: Config,
        desktop: Desktop,
        sessions: Box<dyn SessionSource>,
    ) -> Result<Self> {
        let data_dir = config.data_dir()?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let detector = Arc::new(StatusDetector::new(
            config.session_state_dir(),
            StatusCache::new(config.status_cache_path()?),
            config.polling.staleness(),
        ));
        let known = sessions.load_sessions();
        detector.prime(known.iter().map(|s| s.id.as_str()));

        let (watcher, transitions) =
            LogWatcher::start(detector.clone(), config.polling.fallback_interval());

        let locator = Arc::new(BrowserLocator::new(
            desktop.browser.clone(),
            AnchorDocument::new(config.anchor_document_path()?),
        ));
        let tracker = PresenceTracker::new(
            desktop.clone(),
            locator,
            detector.clone(),
            HandleCache::new(config.handle_cache_path()?),
            TerminalCache::open(config.terminal_cache_path()?),
            &config.presence,
        );
        let requests = RequestQueue::new(config.track_requests_path()?);

        tracing::info!(
            "Tracking {} session(s) under {}",
            known.len(),
            config.session_state_dir().display()
        );

        Ok(Self {
            config,
            desktop,
            sessions,
            detector,
            tracker,
            requests,
            transitions,
            watcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn presence(&self) -> PresenceHandle {
        self.tracker.handle()
    }

    pub fn detector(&self) -> &Arc<StatusDetector> {
        &self.detector
    }

    pub fn locator(&self) -> &Arc<BrowserLocator> {
        self.tracker.locator()
    }

    pub fn load_sessions(&self) -> Vec<Session> {
        self.sessions.load_sessions()
    }

    pub fn focus_controller(&self) -> FocusController {
        FocusController::new(
            self.desktop.windows.clone(),
            self.tracker.handle(),
            &self.config.presence,
        )
    }

    /// One refresh: reload sessions, pick up queued tracking requests, run
    /// the poll fallback if it is due, refresh presence with every
    /// transition delivered since last time, then persist the status cache
    pub fn run_cycle(&mut self) -> Arc<PresenceSnapshot> {
        match self.requests.drain() {
            Ok(queued) => {
                let presence = self.tracker.handle();
                for request in queued {
                    tracing::debug!("Applying queued request {:?}", request);
                    presence.request(request.into());
                }
            }
            Err(e) => tracing::warn!("Failed to read tracking requests: {:#}", e),
        }

        let sessions = self.sessions.load_sessions();
        let active = self.sessions.active_session_ids();

        self.watcher.poll_fallback(sessions.iter().map(|s| s.id.as_str()));
        let transitions: Vec<StatusTransition> = self.transitions.try_iter().collect();

        let snapshot = self.tracker.refresh(&sessions, &active, &transitions);

        if let Err(e) = self.detector.save() {
            tracing::warn!("Failed to save status cache: {:#}", e);
        }
        snapshot
    }

    /// Run the refresh loop on its own thread until `shutdown` is set.
    ///
    /// `on_cycle` sees every published snapshot.
    pub fn spawn<F>(
        mut self,
        shutdown: Arc<AtomicBool>,
        mut on_cycle: F,
    ) -> Result<JoinHandle<()>>
    where
        F: FnMut(&PresenceSnapshot) + Send + 'static,
    {
        let interval = self.config.polling.refresh_interval();
        let handle = thread::Builder::new()
            .name("lookout-refresh".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    let snapshot = self.run_cycle();
                    on_cycle(&snapshot);

                    while started.elapsed() < interval && !shutdown.load(Ordering::SeqCst) {
                        thread::sleep(SHUTDOWN_CHECK_INTERVAL.min(interval));
                    }
                }
                tracing::debug!("Refresh loop stopped");
            })
            .context("Failed to start refresh thread")?;
        Ok(handle)
    }
}
