use axum::Json;
use axum::extract::{Query, State};

use crate::api::{AutocompleteParams, SearchParams, SearchResponse};
use crate::handlers::scope::SessionScope;
use crate::search::{NormalizedDocument, SearchEnvelope, SearchQuery};
use crate::server::AppState;

/// GET /api/v1/search?term=&page=&rows=
///
/// Always `200`: failures come back as an empty page with `error` set.
pub async fn search(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let rows = params
        .rows
        .unwrap_or(state.relay.search_config().default_rows);
    let query = SearchQuery::for_page(
        params.term.unwrap_or_default(),
        params.page.unwrap_or(1),
        rows,
    );

    let result = state.relay.search(scope.session(), &query).await;
    scope.finish().await;

    Json(match result {
        Ok(envelope) => SearchResponse::from_envelope(envelope, None),
        Err(e) => SearchResponse::from_envelope(SearchEnvelope::empty(&query), Some((&e).into())),
    })
}

/// GET /api/v1/search/autocomplete?term=
pub async fn autocomplete(
    State(state): State<AppState>,
    mut scope: SessionScope,
    Query(params): Query<AutocompleteParams>,
) -> Json<Vec<NormalizedDocument>> {
    let term = params.term.unwrap_or_default();
    let docs = state.relay.autocomplete(scope.session(), &term).await;
    scope.finish().await;
    Json(docs)
}
