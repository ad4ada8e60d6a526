//! Authenticated access to the remote API.
//!
//! [`Gateway`] performs ordinary JSON calls with a short timeout;
//! [`StreamRelay`] forwards large downloads without buffering. Both attach the
//! session's auth cookie and renew it from the remote's `Set-Cookie` headers.

mod error;
pub mod redact;
mod stream;

pub use error::RelayError;
pub use stream::{DEFAULT_DOWNLOAD_NAME, Download, StreamRelay, error_response, filename_from_url};

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::RemoteConfig;
use crate::session::{self, Session};

/// Longest upstream error body quoted in an error message.
const MAX_ERROR_MESSAGE_BYTES: usize = 512;

// ============================================================================
// Request / Response
// ============================================================================

/// One outbound call to the remote API. Immutable once sent.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path relative to the remote base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the gateway's default timeout for this call.
    pub timeout: Option<Duration>,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully read response from the remote API.
///
/// `headers` is case-insensitive and keeps every value of repeated headers.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-success status into [`RelayError::Upstream`].
    pub fn ensure_success(self) -> Result<Self, RelayError> {
        if self.is_success() {
            return Ok(self);
        }
        let mut message = String::from_utf8_lossy(&self.body).trim().to_string();
        truncate_at_char_boundary(&mut message, MAX_ERROR_MESSAGE_BYTES);
        if message.is_empty() {
            message = self
                .status
                .canonical_reason()
                .unwrap_or("no reason given")
                .to_string();
        }
        Err(RelayError::Upstream {
            status: self.status.as_u16(),
            message,
        })
    }

    /// Parse the body as JSON. An empty body is `Value::Null`.
    pub fn json_value(&self) -> Result<Value, RelayError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| RelayError::MalformedResponse(format!("invalid json body: {e}")))
    }

    /// Parse the body into a typed structure.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        serde_json::from_value(self.json_value()?)
            .map_err(|e| RelayError::MalformedResponse(e.to_string()))
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Sends authenticated requests to the remote API on behalf of a session.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
    base_url: String,
    cookie_name: String,
    user_agent: String,
}

impl Gateway {
    /// Build a gateway with a ~10s connect and overall budget (per config).
    pub fn new(remote: &RemoteConfig) -> Result<Self, RelayError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = remote.user_agent();
        let client = Client::builder()
            .user_agent(user_agent.as_str())
            .default_headers(default_headers)
            .connect_timeout(remote.connect_timeout())
            .timeout(remote.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: remote.base_url().to_string(),
            cookie_name: remote.auth_cookie_name.clone(),
            user_agent,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Absolute URL for a path relative to the remote base.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request, renew the session cookie from the response, and fail
    /// on non-success statuses.
    ///
    /// Renewal happens for every response that reached us, including error
    /// statuses. Nothing is sent when the session is expired or has no cookie.
    pub async fn send(
        &self,
        session: &mut Session,
        request: OutboundRequest,
    ) -> Result<GatewayResponse, RelayError> {
        let response = self.execute(session, &request).await?;
        self.renew(session, &response);
        response.ensure_success().inspect_err(|e| {
            error!(
                method = %request.method,
                path = %request.path,
                error = %e,
                "Remote API returned an error"
            );
        })
    }

    /// Perform the call without touching the session.
    ///
    /// The returned response may carry any status; pair with [`Gateway::renew`]
    /// and [`GatewayResponse::ensure_success`]. Useful for issuing independent
    /// lookups concurrently against one session.
    pub async fn execute(
        &self,
        session: &Session,
        request: &OutboundRequest,
    ) -> Result<GatewayResponse, RelayError> {
        session::ensure_valid(session)?;
        let cookie = session
            .auth_cookie
            .as_deref()
            .ok_or(RelayError::AuthCookieMissing)?;

        let mut builder = self
            .client
            .request(request.method.clone(), self.url_for(&request.path))
            .header(COOKIE, format!("{}={}", self.cookie_name, cookie));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let outbound = builder.build()?;
        let method = outbound.method().clone();
        let url = outbound.url().clone();
        debug!(
            method = %method,
            url = %url,
            headers = ?redact::mask_headers(outbound.headers()),
            "Sending remote request"
        );

        let response = self.client.execute(outbound).await.map_err(|e| {
            error!(method = %method, path = %request.path, error = %e, "Remote request failed");
            RelayError::Transport(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            error!(method = %method, path = %request.path, error = %e, "Reading remote response failed");
            RelayError::Transport(e)
        })?;

        debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            headers = ?redact::mask_headers(&headers),
            body_bytes = body.len(),
            "Remote response received"
        );

        Ok(GatewayResponse {
            status,
            headers,
            body,
        })
    }

    /// Apply a renewed auth cookie from `response`, if it carries one.
    ///
    /// Returns whether the session changed.
    pub fn renew(&self, session: &mut Session, response: &GatewayResponse) -> bool {
        renew_from_headers(session, &response.headers, &self.cookie_name)
    }
}

pub(crate) fn renew_from_headers(
    session: &mut Session,
    headers: &HeaderMap,
    cookie_name: &str,
) -> bool {
    match session::extract_renewed_cookie(headers, cookie_name, Utc::now()) {
        Some(renewed) => {
            debug!(
                session_id = %session.id,
                expires_at = ?renewed.expires_at,
                "Renewed remote auth cookie"
            );
            session::apply_renewal(session, renewed);
            true
        }
        None => false,
    }
}

/// Truncate a string at a char boundary, in place.
fn truncate_at_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
