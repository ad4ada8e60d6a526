//! Caller authentication for `/api/v1/*`.
//!
//! With `server.api_token` set, callers must send `Authorization: Bearer
//! <token>`. Without it, only loopback peers are served.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::server::AppState;

/// Decide whether a caller may use the API.
///
/// Tokens are compared through their SHA-256 digests so the comparison time
/// does not depend on where the first mismatch sits.
pub fn is_authorized(token: Option<&str>, peer: &SocketAddr, headers: &HeaderMap) -> bool {
    let Some(expected) = token else {
        return peer.ip().is_loopback();
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|provided| {
            Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
        })
}

pub async fn require_api_token(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_authorized(state.api_token.as_deref(), &peer, request.headers()) {
        return next.run(request).await;
    }
    warn!(peer = %peer, path = %request.uri().path(), "Rejected unauthorized API caller");
    StatusCode::UNAUTHORIZED.into_response()
}
