//! Shared API types for the caller-facing HTTP surface.
//!
//! These types define the contract between the relay and the application
//! that consumes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::RelayError;
use crate::search::{NormalizedDocument, SearchEnvelope};

/// Header naming the relay session an inbound request acts for.
pub const SESSION_HEADER: &str = "x-session-id";

// ============================================================================
// Session Types
// ============================================================================

/// Hand over a remote auth cookie issued elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishSessionRequest {
    pub auth_cookie: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishSessionResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Read Results
// ============================================================================

/// Caller-visible failure of a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&RelayError> for ErrorInfo {
    fn from(err: &RelayError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a read: data, or no data plus the reason.
///
/// `data: null` with `error: null` means the remote had nothing; `error`
/// set means the read failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fetched<T> {
    pub data: Option<T>,
    pub error: Option<ErrorInfo>,
}

impl<T> Fetched<T> {
    pub fn ok(data: Option<T>) -> Self {
        Self { data, error: None }
    }

    pub fn failed(err: &RelayError) -> Self {
        Self {
            data: None,
            error: Some(err.into()),
        }
    }
}

impl<T> From<Result<Option<T>, RelayError>> for Fetched<T> {
    fn from(result: Result<Option<T>, RelayError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }
}

// ============================================================================
// Settings Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub user_id: String,
    pub name: String,
}

/// Password change forwarded verbatim to the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}

impl PasswordChange {
    /// Check the form locally before anything is sent.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.current_password.is_empty() || self.password.is_empty() {
            return Err(RelayError::Rejected(
                "current and new password are required".to_string(),
            ));
        }
        if self.password != self.password_confirmation {
            return Err(RelayError::Rejected(
                "password confirmation does not match".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Search Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub term: Option<String>,
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub rows: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutocompleteParams {
    #[serde(default)]
    pub term: Option<String>,
}

/// Search results in search-engine response layout, plus paging hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub response_header: ResponseHeader,
    pub response: ResponseBody,
    pub pagination: Pagination,
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub status: i32,
    #[serde(rename = "QTime")]
    pub q_time: u64,
    pub params: QueryParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParams {
    pub term: String,
    pub start: u64,
    pub rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub num_found: u64,
    pub start: u64,
    pub docs: Vec<NormalizedDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub rows: u64,
    pub total_pages: u64,
}

impl SearchResponse {
    pub fn from_envelope(envelope: SearchEnvelope, error: Option<ErrorInfo>) -> Self {
        let pagination = Pagination {
            page: envelope.page(),
            rows: envelope.rows,
            total_pages: envelope.total_pages(),
        };
        Self {
            response_header: ResponseHeader {
                status: if error.is_some() { 1 } else { 0 },
                q_time: envelope.q_time_ms,
                params: QueryParams {
                    term: envelope.term,
                    start: envelope.start,
                    rows: envelope.rows,
                },
            },
            response: ResponseBody {
                num_found: envelope.num_found,
                start: envelope.start,
                docs: envelope.docs,
            },
            pagination,
            error,
        }
    }
}
