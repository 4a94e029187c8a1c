//! Network fetch path.
//!
//! [`HttpFetcher`] issues requests with reqwest and labels each response with
//! its relation to the application origin, the way a browser would:
//! same-origin → basic, cross-origin with `Access-Control-Allow-Origin` →
//! cors, cross-origin in no-cors mode → opaque.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use reqwest::Method;
use tracing::debug;
use url::Url;

use crate::cache::request::{Request, RequestMode};
use crate::cache::response::{Response, ResponseType};
use crate::config::NetworkConfig;
use crate::error::{FetchError, SetupError};

/// Anything that can turn a request into a response over the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Shared handle to a fetcher.
pub type SharedFetcher = Arc<dyn Fetcher>;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
    timeout: Option<std::time::Duration>,
}

impl HttpFetcher {
    pub fn new(origin: Url, config: &NetworkConfig) -> Result<Self, SetupError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            origin,
            timeout: config.request_timeout(),
        })
    }

    /// Classify by where the response actually came from, after redirects.
    fn response_type(&self, request: &Request, response: &reqwest::Response) -> Result<ResponseType, FetchError> {
        if response.url().origin() == self.origin.origin() {
            return Ok(ResponseType::Basic);
        }
        match request.mode {
            RequestMode::NoCors => Ok(ResponseType::Opaque),
            _ if response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) => Ok(ResponseType::Cors),
            _ => Err(FetchError::CorsRejected(response.url().to_string())),
        }
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => FetchError::Timeout(timeout),
            _ => FetchError::Network(err.to_string()),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if request.mode == RequestMode::Websocket {
            return Err(FetchError::Unsupported("websocket upgrade".to_string()));
        }
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FetchError::Unsupported(format!("method {}", request.method)))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let upstream = builder.send().await.map_err(|e| self.map_error(e))?;
        let response_type = self.response_type(request, &upstream)?;
        let status = upstream.status().as_u16();
        let final_url = upstream.url().to_string();
        let headers: Vec<(String, String)> = upstream
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = upstream.bytes().await.map_err(|e| self.map_error(e))?;

        debug!(
            method = %request.method,
            url = %request.url,
            status,
            response_type = %response_type,
            size = body.len(),
            "Fetched from network"
        );

        Ok(Response {
            status,
            response_type,
            url: Some(final_url),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("etag"));
    }

    #[tokio::test]
    async fn test_websocket_is_unsupported() {
        let origin = Url::parse("http://127.0.0.1:9/").unwrap();
        let fetcher = HttpFetcher::new(origin.clone(), &NetworkConfig::default()).unwrap();
        let request = Request::get(origin).with_mode(RequestMode::Websocket);
        assert!(matches!(
            fetcher.fetch(&request).await,
            Err(FetchError::Unsupported(_))
        ));
    }
}
