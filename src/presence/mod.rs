//! Which surfaces are live for each session, and what each session's
//! indicator shows.

pub mod focus;
pub mod handle_cache;
pub mod matcher;
pub mod requests;
pub mod snapshot;
pub mod terminals;
pub mod title;
pub mod tracker;

pub use focus::FocusController;
pub use handle_cache::{CachedHandleEntry, EditorSurface, HandleCache, Reassociation};
pub use matcher::{KnownNames, MatchedWindow, WindowMatcher};
pub use requests::{QueuedRequest, RequestQueue};
pub use snapshot::{PresenceHandle, PresenceSnapshot, SessionPresence, SnapshotHandle, TrackRequest};
pub use terminals::TerminalCache;
pub use tracker::PresenceTracker;
