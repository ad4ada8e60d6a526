//! RFC 9457 problem details responses.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::gateway::RelayError;

const CONTENT_TYPE: &str = "application/problem+json";

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProblemDetails {
    pub fn new(status: StatusCode, problem_type: &str, detail: impl Into<String>) -> Self {
        Self {
            problem_type: format!("urn:rsrelay:problem:{problem_type}"),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail: Some(detail.into()),
        }
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, CONTENT_TYPE)], Json(self)).into_response()
    }
}

pub fn bad_request(detail: impl Into<String>) -> ProblemDetails {
    ProblemDetails::new(StatusCode::BAD_REQUEST, "bad_request", detail)
}

pub fn unprocessable(detail: impl Into<String>) -> ProblemDetails {
    ProblemDetails::new(StatusCode::UNPROCESSABLE_ENTITY, "rejected", detail)
}

/// Problem response for a failed relay operation, typed by its error kind.
pub fn from_relay_error(err: &RelayError) -> ProblemDetails {
    ProblemDetails::new(err.status_code(), err.kind(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_errors_keep_kind_and_status() {
        let problem = from_relay_error(&RelayError::SessionExpired);
        assert_eq!(problem.status, 401);
        assert_eq!(problem.title, "Unauthorized");
        assert_eq!(problem.problem_type, "urn:rsrelay:problem:session_expired");
    }

    #[test]
    fn response_uses_problem_content_type() {
        let response = bad_request("missing term").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
    }
}
