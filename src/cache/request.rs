//! Request descriptors and request identity.
//!
//! A request's identity in the cache is its method plus its URL. The query
//! string is part of the identity; the fragment is not, since it never
//! reaches the network.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the requester intends to use the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page load or reload.
    Navigate,
    /// Subresource restricted to the application's origin.
    SameOrigin,
    /// Cross-origin subresource that expects permission headers.
    Cors,
    /// Subresource fetched without permission headers (scripts, images, fonts).
    NoCors,
    /// Connection upgrade to a WebSocket.
    Websocket,
}

impl RequestMode {
    /// Parse a `Sec-Fetch-Mode` header value.
    pub fn from_fetch_mode(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => Some(Self::Navigate),
            "same-origin" => Some(Self::SameOrigin),
            "cors" => Some(Self::Cors),
            "no-cors" => Some(Self::NoCors),
            "websocket" => Some(Self::Websocket),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestMode::Navigate => write!(f, "navigate"),
            RequestMode::SameOrigin => write!(f, "same-origin"),
            RequestMode::Cors => write!(f, "cors"),
            RequestMode::NoCors => write!(f, "no-cors"),
            RequestMode::Websocket => write!(f, "websocket"),
        }
    }
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method, upper-cased.
    pub method: String,

    /// Absolute request URL.
    pub url: Url,

    /// Request mode.
    pub mode: RequestMode,

    /// Request headers in arrival order.
    pub headers: Vec<(String, String)>,

    /// Request body; empty for GET.
    pub body: Bytes,
}

impl Request {
    /// A subresource GET, as issued by a script or image tag.
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            mode: RequestMode::NoCors,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A top-level navigation.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_mode(RequestMode::Navigate)
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the URL scheme is one the coordinator may intercept.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Cache identity of this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Identity of a cache entry: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
        }
    }

    /// Key for a plain GET of `url`.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
