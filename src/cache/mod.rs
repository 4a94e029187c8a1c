//! Versioned blob cache.
//!
//! - [`request`]: Request descriptors and request identity
//! - [`response`]: Response descriptors and the cacheability predicate
//! - [`store`]: `Cache` / `CacheStorage` traits and the in-memory backend
//! - [`disk`]: Disk-backed storage, one directory per generation
//! - [`codec`]: zstd compression for persisted bodies

pub mod codec;
pub mod disk;
pub mod request;
pub mod response;
pub mod store;
