//! Read-only remote resources.
//!
//! Reads never fail at the HTTP level: a failed lookup is `200` with
//! `data: null` and the error kind in `error`.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::Value;
use tracing::warn;

use crate::api::Fetched;
use crate::gateway::RelayError;
use crate::handlers::scope::SessionScope;
use crate::server::AppState;

fn fetched(what: &str, result: Result<Option<Value>, RelayError>) -> Json<Fetched<Value>> {
    if let Err(e) = &result {
        warn!(resource = %what, kind = e.kind(), error = %e, "Read failed");
    }
    Json(result.into())
}

/// GET /api/v1/resources/{*path}
pub async fn get_resource(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Path(path): Path<String>,
) -> Json<Fetched<Value>> {
    let result = state.relay.fetch_resource(scope.session(), &path).await;
    scope.finish().await;
    fetched(&path, result)
}

/// GET /api/v1/ping
pub async fn ping(State(state): State<AppState>, mut scope: SessionScope) -> Json<Fetched<Value>> {
    let result = state.relay.ping(scope.session()).await;
    scope.finish().await;
    fetched("ping", result.map(Some))
}

/// GET /api/v1/partners
pub async fn list_partners(
    State(state): State<AppState>,
    mut scope: SessionScope,
) -> Json<Fetched<Value>> {
    let result = state.relay.fetch_partners(scope.session()).await;
    scope.finish().await;
    fetched("partners", result.map(Some))
}

/// GET /api/v1/partners/{id}
pub async fn get_partner(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Path(id): Path<String>,
) -> Json<Fetched<Value>> {
    let result = state.relay.fetch_partner(scope.session(), &id).await;
    scope.finish().await;
    fetched("partner", result.map(Some))
}

/// GET /api/v1/partners/{id}/collections
pub async fn get_partner_collections(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Path(id): Path<String>,
) -> Json<Fetched<Value>> {
    let result = state
        .relay
        .fetch_partner_collections(scope.session(), &id)
        .await;
    scope.finish().await;
    fetched("partner collections", result.map(Some))
}

/// GET /api/v1/collections/{id}
pub async fn get_collection(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Path(id): Path<String>,
) -> Json<Fetched<Value>> {
    let result = state.relay.fetch_collection(scope.session(), &id).await;
    scope.finish().await;
    fetched("collection", result.map(Some))
}
