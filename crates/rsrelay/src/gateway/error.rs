//! Relay error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the gateway, the stream relay and everything built on them.
///
/// Transport failures never escape as raw `reqwest` errors to callers of the
/// caller surface; they are reported through [`RelayError::kind`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// The session has no expiry or it lies in the past. No network I/O happened.
    #[error("remote session has expired")]
    SessionExpired,

    /// The session holds no auth cookie to attach.
    #[error("remote auth cookie missing from session")]
    AuthCookieMissing,

    /// The remote API answered with a non-success status.
    #[error("upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    /// Connecting to or reading from the remote API failed (including timeouts).
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote API answered with a body that does not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A download path could not be turned into a remote URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The remote API accepted a write but reported an application error.
    #[error("{0}")]
    Rejected(String),
}

impl RelayError {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionExpired => "session_expired",
            Self::AuthCookieMissing => "auth_cookie_missing",
            Self::Upstream { .. } | Self::Transport(_) => "upstream_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Rejected(_) => "rejected",
        }
    }

    /// HTTP status reported to callers for this error. Never a success status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionExpired | Self::AuthCookieMissing => StatusCode::UNAUTHORIZED,
            Self::Transport(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { .. } | Self::Transport(_) | Self::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// True for failures of the remote API itself (status or transport).
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(RelayError::SessionExpired.kind(), "session_expired");
        assert_eq!(RelayError::AuthCookieMissing.kind(), "auth_cookie_missing");
        assert_eq!(
            RelayError::Upstream {
                status: 500,
                message: "boom".to_string()
            }
            .kind(),
            "upstream_error"
        );
        assert_eq!(
            RelayError::MalformedResponse("x".to_string()).kind(),
            "malformed_response"
        );
    }

    #[test]
    fn status_codes_are_never_success() {
        let errors = [
            RelayError::SessionExpired,
            RelayError::AuthCookieMissing,
            RelayError::Upstream {
                status: 404,
                message: "not found".to_string(),
            },
            RelayError::MalformedResponse("x".to_string()),
            RelayError::InvalidUrl("x".to_string()),
            RelayError::Rejected("x".to_string()),
        ];
        for err in errors {
            assert!(!err.status_code().is_success(), "{err:?}");
        }
    }

    #[test]
    fn display_includes_upstream_status() {
        let err = RelayError::Upstream {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "upstream error (status 503): maintenance");
        assert!(err.is_upstream());
        assert!(!RelayError::SessionExpired.is_upstream());
    }
}
