//! Liveness and build metadata endpoints. Never touch the remote API.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::build_info::BuildInfo;
use crate::server::AppState;

/// GET /livez
pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// GET /version
pub async fn version(State(state): State<AppState>) -> Json<BuildInfo> {
    Json(BuildInfo::current(state.relay.gateway().user_agent()))
}
