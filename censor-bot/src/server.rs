//! # HTTP Server
//!
//! A minimal axum server exposing only the two admin endpoints this bot
//! needs: `/health` for liveness and `/metrics` for the Prometheus text
//! surfaces described in the external interfaces. Grounded on the gateway's
//! own `create_server`/`AppState` shape, stripped of everything that shape
//! carried for proxying provider traffic.
//!
//! Client IP resolution follows the gateway's own `extract_ip_address`
//! pattern (`dashboard/security`): trust `http.proxy_header` only when the
//! immediate peer is in the configured `http.proxies` allowlist, otherwise
//! fall back to the socket's own address.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::metrics::PrometheusMetrics;

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<PrometheusMetrics>,
    pub started_at: Instant,
    pub proxy_header: Option<String>,
    pub trusted_proxies: Arc<HashSet<IpAddr>>,
}

pub fn create_server(metrics: Arc<PrometheusMetrics>, http: &HttpConfig) -> Router {
    let trusted_proxies = http
        .proxies
        .iter()
        .filter_map(|p| p.parse::<IpAddr>().ok())
        .collect::<HashSet<_>>();

    let state = AppState {
        metrics,
        started_at: Instant::now(),
        proxy_header: http.proxy_header.clone(),
        trusted_proxies: Arc::new(trusted_proxies),
    };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(std::time::Duration::from_secs(5))),
        )
        .layer(middleware::from_fn_with_state(state.clone(), resolve_client_ip))
        .with_state(state)
}

/// Resolves the caller's IP, trusting `proxy_header` only when the direct
/// peer address is in `trusted_proxies`, and records it on the request's
/// tracing span so `/health`/`/metrics` access can be attributed to the
/// real client behind a reverse proxy rather than the proxy itself.
async fn resolve_client_ip(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> impl IntoResponse {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let is_trusted_peer = peer.is_some_and(|ip| state.trusted_proxies.contains(&ip));

    let client_ip = state
        .proxy_header
        .as_deref()
        .filter(|_| is_trusted_peer)
        .and_then(|header_name| headers.get(header_name))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    tracing::debug!(%client_ip, path = %request.uri().path(), "http request");
    next.run(request).await
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
