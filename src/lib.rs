//! Lookout - tracks which desktop surfaces belong to each agent session and
//! whether the session is working, idle or waiting for the user.
//!
//! This library crate exposes internal modules for integration testing.

pub mod browser;
pub mod config;
pub mod data;
pub mod engine;
pub mod platform;
pub mod presence;
pub mod sessions;
pub mod status;
pub mod util;
