use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::service::RelayService;
use crate::session::SessionStore;
use crate::sync::KeyedLocks;

/// Default cap on concurrent `/api/v1` requests.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    pub sessions: Arc<dyn SessionStore>,
    /// Serializes load-renew-save per session id.
    pub session_locks: KeyedLocks,
    pub api_token: Option<String>,
    pub max_connections: usize,
}

impl AppState {
    pub fn new(relay: RelayService, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            relay: Arc::new(relay),
            sessions,
            session_locks: KeyedLocks::new(),
            api_token: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    #[must_use]
    pub fn with_api_token(mut self, api_token: Option<String>) -> Self {
        self.api_token = api_token;
        self
    }
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    let max_connections = state.max_connections;

    // Downloads may run for up to the remote download timeout; no request timeout here.
    let streaming_routes = Router::new()
        .route("/download/{*path}", get(handlers::v1::download))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/session",
            post(handlers::v1::establish_session).delete(handlers::v1::logout),
        )
        .route("/ping", get(handlers::v1::ping))
        .route("/resources/{*path}", get(handlers::v1::get_resource))
        .route("/partners", get(handlers::v1::list_partners))
        .route("/partners/{id}", get(handlers::v1::get_partner))
        .route(
            "/partners/{id}/collections",
            get(handlers::v1::get_partner_collections),
        )
        .route("/collections/{id}", get(handlers::v1::get_collection))
        .route("/search", get(handlers::v1::search))
        .route("/search/autocomplete", get(handlers::v1::autocomplete))
        .route("/settings/profile", patch(handlers::v1::update_profile))
        .route("/settings/password", patch(handlers::v1::update_password))
        .with_state(state.clone())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ));

    let api_v1 = Router::new()
        .merge(streaming_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::api_auth::require_api_token,
        ))
        .layer(ConcurrencyLimitLayer::new(max_connections));

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/version", get(handlers::version))
        .with_state(state)
        .nest("/api/v1", api_v1)
}
