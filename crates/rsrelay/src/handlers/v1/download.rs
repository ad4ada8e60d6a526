use axum::extract::{Path, State};
use axum::response::Response;

use crate::handlers::scope::SessionScope;
use crate::server::AppState;

/// GET /api/v1/download/{*path}
///
/// The session is saved once the upstream headers are in; the body keeps
/// streaming after the handler returns.
pub async fn download(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Path(path): Path<String>,
) -> Response {
    let response = state.relay.stream_download(scope.session(), &path).await;
    scope.finish().await;
    response
}
