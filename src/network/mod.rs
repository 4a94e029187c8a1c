//! Network access.
//!
//! - [`fetcher`]: `Fetcher` trait and the reqwest-backed `HttpFetcher`

pub mod fetcher;
