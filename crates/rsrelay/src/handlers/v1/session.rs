//! Session handover and logout.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::info;

use crate::api::{EstablishSessionRequest, EstablishSessionResponse, SESSION_HEADER};
use crate::handlers::problem_details;
use crate::handlers::scope::session_id_from;
use crate::server::AppState;
use crate::session::{Session, new_session_id};

/// POST /api/v1/session
pub async fn establish_session(
    State(state): State<AppState>,
    Json(req): Json<EstablishSessionRequest>,
) -> Response {
    let cookie = req.auth_cookie.trim();
    if cookie.is_empty() {
        return problem_details::bad_request("auth_cookie must not be empty").into_response();
    }
    if req.expires_at <= Utc::now() {
        return problem_details::unprocessable("expires_at is in the past").into_response();
    }

    let session_id = new_session_id();
    state
        .sessions
        .set(Session::established(&session_id, cookie, req.expires_at))
        .await;
    info!(session_id = %session_id, expires_at = %req.expires_at, "Session established");

    let response = EstablishSessionResponse {
        session_id,
        expires_at: req.expires_at,
    };
    (StatusCode::CREATED, Json(response)).into_response()
}

/// DELETE /api/v1/session
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_from(&headers) else {
        return problem_details::bad_request(format!("missing {SESSION_HEADER} header"))
            .into_response();
    };

    let _guard = state.session_locks.acquire(&session_id).await;
    if state.sessions.clear(&session_id).await {
        info!(session_id = %session_id, "Session cleared");
    }
    StatusCode::NO_CONTENT.into_response()
}
