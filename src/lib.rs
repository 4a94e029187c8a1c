//! shell-cache: offline caching for single-page web applications.
//!
//! A coordinator intercepts requests for the application's origin and
//! answers them from a versioned cache:
//!   navigations → network first, cached shell document when offline
//!   assets      → cache first, refreshed in the background
//!
//! Cache generations are named `<prefix><version>`; installing a new version
//! precaches the shell, activating it deletes every older generation.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod metrics;
pub mod network;
pub mod server;
