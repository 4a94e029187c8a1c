//! Response descriptors and the cacheability predicate.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How a response relates to the requesting origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    Basic,
    /// Cross-origin response with permission headers.
    Cors,
    /// Cross-origin response fetched without permission headers.
    /// Its status is not meaningful to the requester.
    Opaque,
    /// Synthesized network failure.
    Error,
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseType::Basic => write!(f, "basic"),
            ResponseType::Cors => write!(f, "cors"),
            ResponseType::Opaque => write!(f, "opaque"),
            ResponseType::Error => write!(f, "error"),
        }
    }
}

/// A response as seen by the coordinator. The body is never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub response_type: ResponseType,
    /// Final URL after redirects, when known.
    pub url: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, response_type: ResponseType, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            response_type,
            url: None,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A same-origin response.
    pub fn basic(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, ResponseType::Basic, body)
    }

    /// A cross-origin response with permission headers.
    pub fn cors(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, ResponseType::Cors, body)
    }

    /// A cross-origin response without permission headers.
    pub fn opaque(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, ResponseType::Opaque, body)
    }

    /// The generic failure handed back when neither network nor cache can answer.
    pub fn network_error() -> Self {
        Self::new(0, ResponseType::Error, Bytes::new())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_network_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Status in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Whether a network response may be written into the cache.
///
/// First match wins:
/// 1. absent → no
/// 2. opaque → yes (status is unreadable, third-party assets would never cache otherwise)
/// 3. status != 200 → no
/// 4. basic or cors → yes, anything else → no
pub fn is_cacheable(response: Option<&Response>) -> bool {
    let Some(response) = response else {
        return false;
    };
    if response.response_type == ResponseType::Opaque {
        return true;
    }
    if response.status != 200 {
        return false;
    }
    matches!(response.response_type, ResponseType::Basic | ResponseType::Cors)
}
