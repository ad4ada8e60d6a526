//! Account writes forwarded to the remote API.
//!
//! Unlike reads, failures here are surfaced as problem details so the caller
//! can show them to the user.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::api::{PasswordChange, UpdateProfileRequest};
use crate::gateway::RelayError;
use crate::handlers::problem_details;
use crate::handlers::scope::SessionScope;
use crate::server::AppState;

fn respond(result: Result<serde_json::Value, RelayError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Account update failed");
            problem_details::from_relay_error(&e).into_response()
        }
    }
}

/// PATCH /api/v1/settings/profile
pub async fn update_profile(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Json(req): Json<UpdateProfileRequest>,
) -> Response {
    let result = state
        .relay
        .update_profile_name(scope.session(), &req.user_id, &req.name)
        .await;
    scope.finish().await;
    respond(result)
}

/// PATCH /api/v1/settings/password
pub async fn update_password(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Json(change): Json<PasswordChange>,
) -> Response {
    let result = state.relay.update_password(scope.session(), &change).await;
    scope.finish().await;
    respond(result)
}
