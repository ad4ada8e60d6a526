//! Streaming download relay.
//!
//! Large payloads are forwarded chunk by chunk: the upstream response body is
//! wrapped into an axum [`Body`] stream, so memory use stays bounded no matter
//! the size of the file. Dropping the inbound response drops the outbound
//! transfer with it.

use axum::body::Body;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::Client;
use tracing::{debug, error, info};
use url::Url;

use super::{RelayError, redact, renew_from_headers};
use crate::config::RemoteConfig;
use crate::session::{self, Session};

/// File name used when none can be derived from the source URL.
pub const DEFAULT_DOWNLOAD_NAME: &str = "downloaded_file";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Issues long-lived authenticated download requests.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    client: Client,
    base_url: String,
    cookie_name: String,
}

impl StreamRelay {
    /// Connection establishment stays short; the transfer itself may take up
    /// to the configured download timeout.
    pub fn new(remote: &RemoteConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .user_agent(remote.user_agent())
            .connect_timeout(remote.connect_timeout())
            .timeout(remote.download_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: remote.base_url().to_string(),
            cookie_name: remote.auth_cookie_name.clone(),
        })
    }

    /// Resolve a download path to an absolute remote URL with `download=true`.
    ///
    /// Relative paths are joined onto the remote base. Absolute URLs are only
    /// accepted when they point at the remote API's own origin, so the auth
    /// cookie is never sent anywhere else.
    pub fn resolve_url(&self, path: &str) -> Result<Url, RelayError> {
        let path = path.trim();
        let absolute = path.starts_with("http://") || path.starts_with("https://");
        let raw = if absolute {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };

        let mut url = Url::parse(&raw).map_err(|e| RelayError::InvalidUrl(format!("{raw}: {e}")))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(RelayError::InvalidUrl("no host detected".to_string()));
        }

        if absolute {
            let base = Url::parse(&self.base_url)
                .map_err(|e| RelayError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
            if base.origin() != url.origin() {
                return Err(RelayError::InvalidUrl(format!(
                    "{raw} is outside the remote API"
                )));
            }
        }

        url.query_pairs_mut().append_pair("download", "true");
        Ok(url)
    }

    /// Open the upstream transfer. The body has not been read yet.
    ///
    /// The session is renewed from the response headers before the status is
    /// checked, as with ordinary gateway calls.
    pub async fn open(&self, session: &mut Session, path: &str) -> Result<Download, RelayError> {
        session::ensure_valid(session)?;
        let cookie = session
            .auth_cookie
            .as_deref()
            .ok_or(RelayError::AuthCookieMissing)?;

        let url = self.resolve_url(path)?;
        let filename = filename_from_url(&url);
        info!(url = %url, filename = %filename, "Starting download relay");

        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "*/*")
            .header(COOKIE, format!("{}={}", self.cookie_name, cookie))
            .build()?;
        debug!(
            url = %url,
            headers = ?redact::mask_headers(request.headers()),
            "Sending download request"
        );

        let response = self.client.execute(request).await?;
        debug!(
            url = %url,
            status = response.status().as_u16(),
            headers = ?redact::mask_headers(response.headers()),
            "Download response received"
        );

        renew_from_headers(session, response.headers(), &self.cookie_name);

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("download failed")
                    .to_string(),
            });
        }

        Ok(Download { filename, response })
    }

    /// Relay a download to the caller. Always yields a complete response:
    /// the file stream on success, a plain-text error otherwise.
    pub async fn stream_download(&self, session: &mut Session, path: &str) -> Response {
        match self.open(session, path).await {
            Ok(download) => download.into_response(),
            Err(e) => {
                error!(path = %path, error = %e, "File download failed");
                error_response(&e)
            }
        }
    }
}

/// An upstream download whose body has not been consumed.
#[derive(Debug)]
pub struct Download {
    pub filename: String,
    response: reqwest::Response,
}

impl Download {
    pub fn content_type(&self) -> &str {
        self.response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(self.content_type())
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let content_length = self.content_length();
        let disposition = HeaderValue::from_str(&format!(
            "attachment; filename=\"{}\"",
            self.filename
        ))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        let filename = self.filename;
        let stream = self.response.bytes_stream().inspect_err(move |e| {
            error!(filename = %filename, error = %e, "Download stream interrupted");
        });

        let mut response = Body::from_stream(stream).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::CONTENT_DISPOSITION, disposition);
        if let Some(len) = content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        response
    }
}

/// Terminal plain-text response for a failed download.
pub fn error_response(err: &RelayError) -> Response {
    (
        err.status_code(),
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Error downloading file: {err}"),
    )
        .into_response()
}

/// Derive a download name from the last non-empty path segment.
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(sanitize_filename)
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

fn sanitize_filename(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
