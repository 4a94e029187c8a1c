//! Body compression for persisted entries.
//!
//! Bodies are opaque; the codec only applies zstd on the way to disk and
//! reverses it on the way back. Each entry records whether it was compressed,
//! so toggling the setting never strands existing entries.

use crate::config::CacheConfig;
use crate::error::StoreError;

/// zstd codec for stored bodies.
#[derive(Debug, Clone)]
pub struct BodyCodec {
    enabled: bool,
    level: i32,
}

impl BodyCodec {
    pub fn new(enabled: bool, level: i32) -> Self {
        Self { enabled, level }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.compress_bodies, config.zstd_level)
    }

    /// Whether newly written bodies are compressed.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Encode a body for storage. Returns the bytes and whether they are compressed.
    pub fn encode(&self, body: &[u8]) -> Result<(Vec<u8>, bool), StoreError> {
        if !self.enabled {
            return Ok((body.to_vec(), false));
        }
        let compressed = zstd::encode_all(body, self.level).map_err(StoreError::Codec)?;
        Ok((compressed, true))
    }

    /// Decode a stored body.
    pub fn decode(&self, data: &[u8], compressed: bool) -> Result<Vec<u8>, StoreError> {
        if !compressed {
            return Ok(data.to_vec());
        }
        zstd::decode_all(data).map_err(StoreError::Codec)
    }
}
