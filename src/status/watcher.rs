//! Push and pull delivery of event-log changes into the detector.
//!
//! The push path is a recursive `notify` watch on the session-state
//! directory whose events are handled on a dedicated delivery thread. Once
//! the push path reports any error (or never starts) the pull fallback
//! takes over: `poll_fallback` re-observes every session, at most once per
//! fallback interval. Both paths send transitions on the same channel.

use super::detector::{StatusDetector, StatusTransition, EVENT_LOG_NAME};
use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const DELIVERY_WAKE_INTERVAL: Duration = Duration::from_millis(200);

pub struct LogWatcher {
    detector: Arc<StatusDetector>,
    enabled: Arc<AtomicBool>,
    push_failed: Arc<AtomicBool>,
    watcher: Option<RecommendedWatcher>,
    delivery: Option<JoinHandle<()>>,
    transitions: Sender<StatusTransition>,
    fallback_interval: Duration,
    last_poll: Mutex<Option<Instant>>,
}

impl LogWatcher {
    pub fn start(
        detector: Arc<StatusDetector>,
        fallback_interval: Duration,
    ) -> (Self, Receiver<StatusTransition>) {
        let (transitions, transitions_rx) = channel();
        let enabled = Arc::new(AtomicBool::new(true));
        let push_failed = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = channel();

        let watcher = match watch(detector.session_state_dir(), event_tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("Log notifications unavailable, polling instead: {:#}", e);
                push_failed.store(true, Ordering::SeqCst);
                None
            }
        };

        let delivery = watcher.as_ref().and_then(|_| {
            let detector = detector.clone();
            let enabled = enabled.clone();
            let failed = push_failed.clone();
            let transitions = transitions.clone();
            let spawned = thread::Builder::new()
                .name("lookout-log-delivery".to_string())
                .spawn(move || deliver(event_rx, &detector, &enabled, &failed, &transitions));
            match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!("Failed to start log delivery thread: {}", e);
                    push_failed.store(true, Ordering::SeqCst);
                    None
                }
            }
        });

        let log_watcher = Self {
            detector,
            enabled,
            push_failed,
            watcher,
            delivery,
            transitions,
            fallback_interval,
            last_poll: Mutex::new(None),
        };
        (log_watcher, transitions_rx)
    }

    pub fn push_failed(&self) -> bool {
        self.push_failed.load(Ordering::SeqCst)
    }

    /// Re-observe every session if the push path has failed and the last
    /// poll is at least one fallback interval old. Returns how many
    /// transitions were sent.
    pub fn poll_fallback<'a>(&self, session_ids: impl IntoIterator<Item = &'a str>) -> usize {
        if !self.push_failed() {
            return 0;
        }

        {
            let mut last_poll = match self.last_poll.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = Instant::now();
            if last_poll.is_some_and(|at| now.duration_since(at) < self.fallback_interval) {
                return 0;
            }
            *last_poll = Some(now);
        }

        let mut sent = 0;
        for id in session_ids {
            if let Some(transition) = self.detector.observe(id) {
                if self.transitions.send(transition).is_ok() {
                    sent += 1;
                }
            }
        }
        sent
    }
}

impl Drop for LogWatcher {
    fn drop(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);
        drop(self.watcher.take());
        if let Some(delivery) = self.delivery.take() {
            if delivery.join().is_err() {
                tracing::warn!("Log delivery thread panicked");
            }
        }
    }
}

fn watch(dir: &Path, events: Sender<notify::Result<Event>>) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = events.send(res);
        },
        Config::default(),
    )?;
    watcher
        .watch(dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    Ok(watcher)
}

fn deliver(
    events: Receiver<notify::Result<Event>>,
    detector: &StatusDetector,
    enabled: &AtomicBool,
    push_failed: &AtomicBool,
    transitions: &Sender<StatusTransition>,
) {
    while enabled.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(DELIVERY_WAKE_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let event = match event {
            Ok(event) => event,
            Err(e) => {
                if !push_failed.swap(true, Ordering::SeqCst) {
                    tracing::warn!("Log watcher error, enabling poll fallback: {}", e);
                }
                continue;
            }
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            continue;
        }

        let sessions: BTreeSet<String> = event.paths.iter().filter_map(|p| session_for_log(p)).collect();
        for id in sessions {
            if let Some(transition) = detector.observe(&id) {
                if transitions.send(transition).is_err() {
                    return;
                }
            }
        }
    }
}

/// Session id owning an event log path (`.../<id>/events.jsonl`)
fn session_for_log(path: &Path) -> Option<String> {
    if path.file_name()? != EVENT_LOG_NAME {
        return None;
    }
    path.parent()?
        .file_name()?
        .to_str()
        .map(str::to_string)
}
