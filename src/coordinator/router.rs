//! Request classification.

use crate::cache::request::{Request, RequestMode};

/// Which strategy, if any, serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Not intercepted; the default network path handles it.
    PassThrough,
    /// Network-first with shell fallback.
    Navigation,
    /// Cache-first with background revalidation.
    StaticAsset,
}

impl RequestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::PassThrough => "pass_through",
            RequestClass::Navigation => "navigation",
            RequestClass::StaticAsset => "static",
        }
    }
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a request. Only plain GETs over http(s) are ever intercepted.
pub fn classify(request: &Request) -> RequestClass {
    if request.mode == RequestMode::Websocket
        || request.method != "GET"
        || !request.is_http()
    {
        return RequestClass::PassThrough;
    }
    if request.mode == RequestMode::Navigate {
        return RequestClass::Navigation;
    }
    RequestClass::StaticAsset
}
