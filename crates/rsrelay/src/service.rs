//! Remote API operations used by the caller surface.
//!
//! Every operation takes the caller's [`Session`] by `&mut` and may renew it.
//! Nothing here stores sessions.

use axum::response::Response;
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::api::PasswordChange;
use crate::config::{Config, SearchConfig};
use crate::gateway::{Gateway, GatewayResponse, OutboundRequest, RelayError, StreamRelay};
use crate::search::{
    NormalizedDocument, ResultTransformer, SearchEnvelope, SearchPipeline, SearchQuery,
    rewrite_prefix,
};
use crate::session::Session;

/// Local prefix for browsable storage paths.
const FS_PREFIX: &str = "/fs";
const DOWNLOAD_PREFIX: &str = "/download";
const PREVIEW_PREFIX: &str = "/preview";

/// Bundles the gateway, stream relay and search pipeline.
#[derive(Debug, Clone)]
pub struct RelayService {
    gateway: Gateway,
    streams: StreamRelay,
    search: SearchPipeline,
    search_config: SearchConfig,
}

impl RelayService {
    pub fn new(config: &Config) -> Result<Self, RelayError> {
        let gateway = Gateway::new(&config.remote)?;
        let streams = StreamRelay::new(&config.remote)?;
        let transformer = ResultTransformer::new(config.remote.base_url()).with_markers(
            config.search.highlight_open.clone(),
            config.search.highlight_close.clone(),
        );
        let search = SearchPipeline::new(gateway.clone(), transformer);

        Ok(Self {
            gateway,
            streams,
            search,
            search_config: config.search.clone(),
        })
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search_config
    }

    fn remote_base(&self) -> &str {
        self.gateway.base_url()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Fetch a storage listing or file record.
    ///
    /// Returns `None` for a blank path (no call is made) and for bodies that
    /// are not JSON objects. Remote URLs in the listing are made local.
    /// Paths carrying a query, a fragment or dot segments are `InvalidUrl`.
    pub async fn fetch_resource(
        &self,
        session: &mut Session,
        path: &str,
    ) -> Result<Option<Value>, RelayError> {
        let path = path.trim().trim_start_matches('/');
        if path.is_empty() {
            debug!("Blank resource path, nothing to fetch");
            return Ok(None);
        }
        let path = resource_path(path)?;

        let response = self.gateway.send(session, OutboundRequest::get(path)).await?;
        let Value::Object(mut data) = response.json_value()? else {
            return Ok(None);
        };

        data.insert("url".to_string(), json!(format!("{FS_PREFIX}/{path}")));
        if let Some(Value::Array(children)) = data.get_mut("children") {
            for child in children.iter_mut().filter_map(Value::as_object_mut) {
                self.localize_child(child);
            }
        }

        Ok(Some(Value::Object(data)))
    }

    fn localize_child(&self, child: &mut Map<String, Value>) {
        let base = self.remote_base();
        if let Some(Value::String(url)) = child.get_mut("url") {
            *url = rewrite_prefix(url, base, FS_PREFIX);
        }
        let download_url = child
            .get("download_url")
            .and_then(Value::as_str)
            .map(str::to_owned);
        if let Some(download_url) = download_url {
            child.insert(
                "download_url".to_string(),
                json!(rewrite_prefix(&download_url, base, DOWNLOAD_PREFIX)),
            );
            child.insert(
                "preview_url".to_string(),
                json!(rewrite_prefix(&download_url, base, PREVIEW_PREFIX)),
            );
        }
    }

    pub async fn ping(&self, session: &mut Session) -> Result<Value, RelayError> {
        self.get_json(session, "ping").await
    }

    pub async fn fetch_partners(&self, session: &mut Session) -> Result<Value, RelayError> {
        self.get_json(session, "partners").await
    }

    /// Fetch a partner with its collections attached under `collections`.
    ///
    /// Both lookups are independent and run concurrently against the same
    /// session; renewals are applied afterwards in request order.
    pub async fn fetch_partner(&self, session: &mut Session, id: &str) -> Result<Value, RelayError> {
        let id = path_segment(id)?;
        let partner_request = OutboundRequest::get(format!("partners/{id}"));
        let collections_request = OutboundRequest::get(format!("partners/{id}/colls"));

        let shared: &Session = session;
        let (partner, collections) = tokio::join!(
            self.gateway.execute(shared, &partner_request),
            self.gateway.execute(shared, &collections_request),
        );
        for response in [&partner, &collections].into_iter().flatten() {
            self.gateway.renew(session, response);
        }

        let mut partner = into_object(partner?.ensure_success()?)?;
        let collections = collections
            .and_then(GatewayResponse::ensure_success)
            .and_then(|r| r.json_value())
            .unwrap_or_else(|e| {
                warn!(partner_id = %id, error = %e, "Partner collections unavailable");
                Value::Null
            });
        partner.insert("collections".to_string(), collections);

        Ok(Value::Object(partner))
    }

    pub async fn fetch_partner_collections(
        &self,
        session: &mut Session,
        id: &str,
    ) -> Result<Value, RelayError> {
        let id = path_segment(id)?;
        self.get_json(session, &format!("partners/{id}/colls")).await
    }

    /// Fetch a collection with its owning partner attached under `partner`.
    ///
    /// A collection without `partner_id` is malformed.
    pub async fn fetch_collection(
        &self,
        session: &mut Session,
        id: &str,
    ) -> Result<Value, RelayError> {
        let id = path_segment(id)?;
        let response = self
            .gateway
            .send(session, OutboundRequest::get(format!("colls/{id}")))
            .await?;
        let mut collection = into_object(response)?;

        let partner_id = match collection.get("partner_id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(RelayError::MalformedResponse(format!(
                    "collection {id} has no partner_id"
                )));
            }
        };

        if let Some(Value::String(storage_url)) = collection.get_mut("storage_url") {
            *storage_url = rewrite_prefix(storage_url, self.remote_base(), FS_PREFIX);
        }

        let partner_path = format!("partners/{}", path_segment(&partner_id)?);
        let partner = match self.get_json(session, &partner_path).await {
            Ok(partner) => partner,
            Err(e) => {
                warn!(collection_id = %id, partner_id = %partner_id, error = %e, "Collection partner unavailable");
                Value::Null
            }
        };
        collection.insert("partner".to_string(), partner);

        Ok(Value::Object(collection))
    }

    async fn get_json(&self, session: &mut Session, path: &str) -> Result<Value, RelayError> {
        self.gateway
            .send(session, OutboundRequest::get(path))
            .await?
            .json_value()
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    pub async fn update_profile_name(
        &self,
        session: &mut Session,
        user_id: &str,
        name: &str,
    ) -> Result<Value, RelayError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RelayError::Rejected("name must not be empty".to_string()));
        }
        debug!(user_id = %user_id, "Updating remote profile name");
        let request = OutboundRequest::patch("users").with_json(json!({ "username": name }));
        self.write(session, request).await
    }

    pub async fn update_password(
        &self,
        session: &mut Session,
        change: &PasswordChange,
    ) -> Result<Value, RelayError> {
        change.validate()?;
        let body = serde_json::to_value(change)
            .map_err(|e| RelayError::Rejected(format!("invalid password change: {e}")))?;
        self.write(session, OutboundRequest::patch("users").with_json(body))
            .await
    }

    /// Send a write and surface an application-level `error` field as a rejection.
    async fn write(
        &self,
        session: &mut Session,
        request: OutboundRequest,
    ) -> Result<Value, RelayError> {
        let path = request.path.clone();
        let body = self.gateway.send(session, request).await?.json_value()?;
        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            let message = match err {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            error!(path = %path, error = %message, "Remote API rejected update");
            return Err(RelayError::Rejected(message));
        }
        Ok(body)
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    pub async fn search(
        &self,
        session: &mut Session,
        query: &SearchQuery,
    ) -> Result<SearchEnvelope, RelayError> {
        self.search.search(session, query).await
    }

    /// Suggestions for a partial term. Short terms and failures yield nothing.
    pub async fn autocomplete(&self, session: &mut Session, term: &str) -> Vec<NormalizedDocument> {
        let term = term.trim();
        if term.chars().count() < self.search_config.autocomplete_min_chars {
            return Vec::new();
        }

        let query = SearchQuery::new(term, 0, self.search_config.default_rows);
        match self.search.search(session, &query).await {
            Ok(envelope) => envelope.docs,
            Err(e) => {
                warn!(term = %term, error = %e, "Autocomplete failed");
                Vec::new()
            }
        }
    }

    // ------------------------------------------------------------------------
    // Downloads
    // ------------------------------------------------------------------------

    pub async fn stream_download(&self, session: &mut Session, path: &str) -> Response {
        self.streams.stream_download(session, path).await
    }
}

/// Reject ids that would change the remote path's shape.
fn path_segment(id: &str) -> Result<&str, RelayError> {
    let id = id.trim();
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '?', '#', '\\']) {
        return Err(RelayError::InvalidUrl(format!("invalid id: {id:?}")));
    }
    Ok(id)
}

/// Reject storage paths that would leave the path component of the remote URL.
fn resource_path(path: &str) -> Result<&str, RelayError> {
    let escapes = path.contains(['?', '#', '\\'])
        || path.split('/').any(|segment| segment == "." || segment == "..");
    if escapes {
        return Err(RelayError::InvalidUrl(format!("invalid resource path: {path:?}")));
    }
    Ok(path)
}

fn into_object(response: GatewayResponse) -> Result<Map<String, Value>, RelayError> {
    match response.json_value()? {
        Value::Object(map) => Ok(map),
        other => Err(RelayError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
