//! Permissive CORS relay
//!
//! Browser clients cannot call the USNO and NASA endpoints directly, so this
//! small server forwards any request whose path embeds the target URL:
//!
//! ```text
//! GET /https://aa.usno.navy.mil/api/moon/phases/year?year=2024
//!     ──▶ GET https://aa.usno.navy.mil/api/moon/phases/year?year=2024
//! ```
//!
//! `origin`, `referer`, `host` and hop-by-hop headers are stripped before
//! forwarding. Every response carries permissive CORS headers and `OPTIONS`
//! is answered locally with 204.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;

/// Request headers never forwarded upstream
const STRIPPED_REQUEST_HEADERS: &[&str] = &["origin", "referer", "host", "content-length"];

/// Connection-scoped headers (RFC 9110 §7.6.1)
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS";

// ============================================================================
// Errors
// ============================================================================

/// Relay failures, mapped to HTTP responses
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or malformed target URL
    #[error("Invalid target URL: {0}")]
    BadTarget(String),

    /// Upstream unreachable or failed mid-request
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// Server could not bind or serve
    #[error("Server error: {0}")]
    Server(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadTarget(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        let mut response = (self.status(), axum::Json(body)).into_response();
        apply_cors(response.headers_mut());
        response
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Shared relay state
#[derive(Clone)]
pub struct RelayState {
    client: reqwest::Client,
}

impl RelayState {
    /// Build the upstream client
    ///
    /// Decompression is disabled so encoded bodies pass through untouched
    /// together with their `content-encoding` header.
    pub fn new(upstream_timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .no_gzip()
            .timeout(upstream_timeout)
            .build()
            .map_err(|e| RelayError::Server(e.to_string()))?;
        Ok(Self { client })
    }
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Target URL embedded in the request path
pub fn target_from_uri(uri: &Uri) -> Result<url::Url, RelayError> {
    let raw = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("")
        .trim_start_matches('/');

    if raw.is_empty() {
        return Err(RelayError::BadTarget("no target URL in path".to_string()));
    }

    // Some clients collapse `//` in paths
    let repaired = ["https:/", "http:/"]
        .iter()
        .find_map(|scheme| {
            raw.strip_prefix(scheme)
                .filter(|rest| !rest.starts_with('/'))
                .map(|rest| format!("{scheme}/{rest}"))
        })
        .unwrap_or_else(|| raw.to_string());

    let url = url::Url::parse(&repaired).map_err(|e| RelayError::BadTarget(format!("{repaired}: {e}")))?;

    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(RelayError::BadTarget(format!("unsupported target {url}"))),
    }
}

/// Headers to send upstream
fn forward_headers(incoming: &HeaderMap) -> HeaderMap {
    incoming
        .iter()
        .filter(|(name, _)| {
            !STRIPPED_REQUEST_HEADERS.contains(&name.as_str()) && !is_hop_by_hop(name)
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

async fn forward(
    State(state): State<RelayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    if method == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors(response.headers_mut());
        return Ok(response);
    }

    let target = target_from_uri(&uri)?;
    tracing::debug!(method = %method, target = %target, "Relaying request");

    let mut request = state
        .client
        .request(method, target.clone())
        .headers(forward_headers(&headers));
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = request.send().await.map_err(|e| {
        tracing::warn!(target = %target, error = %e, "Upstream unreachable");
        RelayError::Upstream(e.to_string())
    })?;

    let status = upstream.status();
    let mut response_headers: HeaderMap = upstream
        .headers()
        .iter()
        .filter(|(name, _)| {
            !is_hop_by_hop(name)
                && *name != header::CONTENT_LENGTH
                && !name.as_str().starts_with("access-control-")
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    apply_cors(&mut response_headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;

    Ok(response)
}

/// Router with the relay handler on every path
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .fallback(forward)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Server
// ============================================================================

/// CORS relay server
pub struct RelayServer {
    bind_address: SocketAddr,
    state: RelayState,
}

impl RelayServer {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        Ok(Self {
            bind_address: config.bind_address,
            state: RelayState::new(Duration::from_secs(config.upstream_timeout_secs))?,
        })
    }

    /// Override the bind address
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn build_router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), RelayError> {
        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .map_err(|e| RelayError::Server(format!("bind {}: {e}", self.bind_address)))?;

        tracing::info!(addr = %self.bind_address, "CORS relay listening");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| RelayError::Server(e.to_string()))?;

        tracing::info!("CORS relay shutdown complete");
        Ok(())
    }
}
