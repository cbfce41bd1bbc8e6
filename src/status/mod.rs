//! Working/idle detection from each session's append-only event log.
//!
//! Only the last line of a log is ever read. Ambiguous events keep the
//! previously cached status, and a `Working` status whose log has gone quiet
//! for longer than the staleness window decays to `IdleSilent`.

pub mod cache;
pub mod detector;
pub mod event;
pub mod tail;
pub mod watcher;

pub use cache::{StatusCache, StatusRecord};
pub use detector::{StatusDetector, StatusTransition};
pub use watcher::LogWatcher;
