//! Package search against the remote API.
//!
//! The pipeline issues one gateway call per page, times it, and reshapes the
//! remote envelope into a [`SearchEnvelope`] of [`NormalizedDocument`]s.

mod pagination;
mod transform;

pub use pagination::{page_for_start, start_for_page, total_pages};
pub use transform::{NormalizedDocument, PAYLOAD_KEY, ResultTransformer, rewrite_prefix};

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::gateway::{Gateway, OutboundRequest, RelayError};
use crate::session::Session;

/// Remote search path, relative to the API base.
pub const SEARCH_PATH: &str = "search";
/// Scope sent with every search.
pub const SEARCH_SCOPE: &str = "packages";

// ============================================================================
// Query / Envelope
// ============================================================================

/// One page of a search.
///
/// Keep `rows` fixed across all pages of one logical search; offsets are
/// computed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub start: u64,
    pub rows: u64,
}

impl SearchQuery {
    /// `rows` is clamped to at least 1.
    pub fn new(term: impl Into<String>, start: u64, rows: u64) -> Self {
        Self {
            term: term.into(),
            start,
            rows: rows.max(1),
        }
    }

    /// Query for a 1-based page.
    pub fn for_page(term: impl Into<String>, page: u64, rows: u64) -> Self {
        let rows = rows.max(1);
        Self::new(term, start_for_page(page, rows), rows)
    }

    pub fn is_empty(&self) -> bool {
        self.term.trim().is_empty()
    }
}

/// Normalized result of one search page.
///
/// `start + docs.len() <= num_found` is expected but not checked; a
/// misbehaving remote can break it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEnvelope {
    pub num_found: u64,
    pub start: u64,
    pub rows: u64,
    pub q_time_ms: u64,
    pub term: String,
    pub docs: Vec<NormalizedDocument>,
}

impl SearchEnvelope {
    /// An envelope with no hits for `query`.
    pub fn empty(query: &SearchQuery) -> Self {
        Self {
            num_found: 0,
            start: query.start,
            rows: query.rows,
            q_time_ms: 0,
            term: query.term.clone(),
            docs: Vec::new(),
        }
    }

    pub fn total_pages(&self) -> u64 {
        total_pages(self.num_found, self.rows)
    }

    pub fn page(&self) -> u64 {
        page_for_start(self.start, self.rows)
    }
}

// Remote wire shape: `{"response": {"numFound": .., "start": .., "docs": [..]}}`.
#[derive(Debug, Default, Deserialize)]
struct RemoteSearchBody {
    #[serde(default)]
    response: Option<RemoteSearchPage>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteSearchPage {
    #[serde(default, rename = "numFound")]
    num_found: Option<u64>,
    #[serde(default)]
    start: Option<u64>,
    #[serde(default)]
    docs: Option<Vec<Value>>,
}

fn parse_page(raw: Value) -> Result<RemoteSearchPage, RelayError> {
    let body: Option<RemoteSearchBody> = serde_json::from_value(raw)
        .map_err(|e| RelayError::MalformedResponse(format!("unexpected search body: {e}")))?;
    Ok(body.and_then(|b| b.response).unwrap_or_default())
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs searches through the gateway and normalizes the hits.
#[derive(Debug, Clone)]
pub struct SearchPipeline {
    gateway: Gateway,
    transformer: ResultTransformer,
}

impl SearchPipeline {
    pub fn new(gateway: Gateway, transformer: ResultTransformer) -> Self {
        Self {
            gateway,
            transformer,
        }
    }

    pub fn transformer(&self) -> &ResultTransformer {
        &self.transformer
    }

    /// Fetch one page of results.
    ///
    /// A blank term yields an empty envelope without contacting the remote.
    /// A response whose body is empty or not JSON is also an empty envelope.
    /// Gateway failures and JSON of the wrong shape are errors.
    pub async fn search(
        &self,
        session: &mut Session,
        query: &SearchQuery,
    ) -> Result<SearchEnvelope, RelayError> {
        if query.is_empty() {
            debug!("Empty search term, skipping remote call");
            return Ok(SearchEnvelope::empty(query));
        }

        let started = Instant::now();
        let request = OutboundRequest::get(SEARCH_PATH)
            .with_query("scope", SEARCH_SCOPE)
            .with_query("term", &query.term)
            .with_query("start", query.start)
            .with_query("rows", query.rows);

        let response = self
            .gateway
            .send(session, request)
            .await
            .inspect_err(|e| error!(term = %query.term, error = %e, "Search failed"))?;
        let q_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let raw = match response.json_value() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(term = %query.term, error = %e, "Search returned no usable body");
                return Ok(SearchEnvelope::empty(query));
            }
        };
        let page = parse_page(raw)?;

        let docs = self
            .transformer
            .normalize_all(page.docs.unwrap_or_default(), &query.term);

        debug!(
            term = %query.term,
            num_found = page.num_found.unwrap_or(0),
            docs = docs.len(),
            q_time_ms,
            "Search completed"
        );

        Ok(SearchEnvelope {
            num_found: page.num_found.unwrap_or(0),
            start: page.start.unwrap_or(0),
            rows: query.rows,
            q_time_ms,
            term: query.term.clone(),
            docs,
        })
    }
}
