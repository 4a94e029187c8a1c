//! Caching proxy handler.
//!
//! Every request outside the inspection routes is mapped onto the origin,
//! offered to the worker host, and forwarded to the network only when the
//! coordinator does not intercept it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{ACCEPT, UPGRADE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use tracing::{debug, warn};
use url::Url;

use crate::cache::request::{Request, RequestMode};
use crate::cache::response::Response;
use crate::network::fetcher::is_hop_by_hop;
use crate::server::AppState;

/// Upper bound on buffered request bodies.
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Header a page may send to identify itself as a client.
pub const CLIENT_HEADER: &str = "x-shell-cache-client";

/// Set on synthesized network-error responses.
pub const NETWORK_ERROR_HEADER: &str = "x-shell-cache-network-error";

pub async fn proxy(State(state): State<Arc<AppState>>, req: axum::extract::Request) -> axum::response::Response {
    let client_id = client_id(&req);
    let request = match to_request(&state.origin, req).await {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };

    if request.mode == RequestMode::Navigate {
        state
            .host
            .coordinator()
            .clients()
            .register(&client_id, request.url.as_str())
            .await;
    }

    if let Some(response) = state.host.handle(request.clone()).await {
        return into_http(response);
    }

    debug!(method = %request.method, url = %request.url, "Forwarding uncached request");
    match state.fetcher.fetch(&request).await {
        Ok(response) => into_http(response),
        Err(e) => {
            warn!(url = %request.url, error = %e, "Pass-through request failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

fn client_id(req: &axum::extract::Request) -> String {
    if let Some(id) = req.headers().get(CLIENT_HEADER).and_then(|v| v.to_str().ok()) {
        return id.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Infer the request mode the way a browser would have labelled it.
pub fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    if let Some(mode) = header_str(headers, "sec-fetch-mode").and_then(RequestMode::from_fetch_mode) {
        return mode;
    }
    if header_str(headers, UPGRADE.as_str()).is_some_and(|v| v.eq_ignore_ascii_case("websocket")) {
        return RequestMode::Websocket;
    }
    if *method == Method::GET && header_str(headers, ACCEPT.as_str()).is_some_and(|v| v.contains("text/html")) {
        return RequestMode::Navigate;
    }
    RequestMode::SameOrigin
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn to_request(origin: &Url, req: axum::extract::Request) -> Result<Request, axum::response::Response> {
    let (parts, body) = req.into_parts();

    let mut url = origin.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = axum::body::to_bytes(body, MAX_REQUEST_BODY)
        .await
        .map_err(|e| (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response())?;

    Ok(Request {
        method: parts.method.as_str().to_string(),
        mode: request_mode(&parts.method, &parts.headers),
        url,
        headers,
        body,
    })
}

/// Convert a coordinator response into an HTTP response.
pub fn into_http(response: Response) -> axum::response::Response {
    if response.is_network_error() {
        return (StatusCode::BAD_GATEWAY, [(NETWORK_ERROR_HEADER, "1")]).into_response();
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in &response.headers {
        if !is_hop_by_hop(name) {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_mode_from_fetch_metadata() {
        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-mode", HeaderValue::from_static("no-cors"));
        assert_eq!(request_mode(&Method::GET, &headers), RequestMode::NoCors);
    }

    #[test]
    fn test_mode_from_accept_header() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        assert_eq!(request_mode(&Method::GET, &headers), RequestMode::Navigate);
        assert_eq!(request_mode(&Method::POST, &headers), RequestMode::SameOrigin);
    }

    #[test]
    fn test_mode_websocket_upgrade() {
        let mut headers = HeaderMap::new();
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        assert_eq!(request_mode(&Method::GET, &headers), RequestMode::Websocket);
    }

    #[test]
    fn test_network_error_becomes_bad_gateway() {
        let http = into_http(Response::network_error());
        assert_eq!(http.status(), StatusCode::BAD_GATEWAY);
        assert!(http.headers().contains_key(NETWORK_ERROR_HEADER));
    }

    #[test]
    fn test_headers_copied_without_hop_by_hop() {
        let response = Response::basic(200, "body")
            .with_header("content-type", "text/css")
            .with_header("transfer-encoding", "chunked");
        let http = into_http(response);
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers().get("content-type").unwrap(), "text/css");
        assert!(http.headers().get("transfer-encoding").is_none());
    }
}
