//! The uniform reply returned by every operation.

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use crate::agent::AgentError;

/// Status plus JSON body, written back to the client as one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Operation result, or `{"error": "..."}`.
    pub body: Value,
}

impl ApiResponse {
    /// Builds a response from its parts.
    #[must_use]
    pub const fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// `200` carrying `body` serialised as JSON.
    #[must_use]
    pub fn ok<T: Serialize + ?Sized>(body: &T) -> Self {
        Self::serialised(200, body)
    }

    /// `201` carrying the created resource.
    #[must_use]
    pub fn created<T: Serialize + ?Sized>(body: &T) -> Self {
        Self::serialised(201, body)
    }

    /// Error response with `{"error": message}` as its body.
    #[must_use]
    pub fn error(status: u16, message: impl fmt::Display) -> Self {
        Self::new(status, json!({ "error": message.to_string() }))
    }

    /// `400`.
    #[must_use]
    pub fn bad_request(message: impl fmt::Display) -> Self {
        Self::error(400, message)
    }

    /// `404`.
    #[must_use]
    pub fn not_found(message: impl fmt::Display) -> Self {
        Self::error(404, message)
    }

    /// `503`, used whenever the agent is not available to serve the call.
    #[must_use]
    pub fn service_unavailable(message: impl fmt::Display) -> Self {
        Self::error(503, message)
    }

    /// `500`.
    #[must_use]
    pub fn internal_error(message: impl fmt::Display) -> Self {
        Self::error(500, message)
    }

    /// Maps an agent result onto `ok` or the error's own status.
    #[must_use]
    pub fn from_result<T: Serialize>(result: Result<T, AgentError>) -> Self {
        match result {
            Ok(body) => Self::ok(&body),
            Err(error) => Self::agent_error(&error),
        }
    }

    /// Error response carrying the agent error's own status.
    #[must_use]
    pub fn agent_error(error: &AgentError) -> Self {
        Self::error(error.status(), error)
    }

    /// `true` for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// The `error` message of an error response.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }

    fn serialised<T: Serialize + ?Sized>(status: u16, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self::new(status, value),
            Err(error) => {
                Self::internal_error(format_args!("failed to serialise response: {error}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::not_found(AgentError::EndpointNotFound { id: 7 }, 404)]
    #[case::conflict(AgentError::EndpointExists { id: 7 }, 409)]
    #[case::invalid(AgentError::InvalidLabel { label: " x".into() }, 400)]
    fn agent_errors_keep_their_status(#[case] error: AgentError, #[case] status: u16) {
        let message = error.to_string();
        let response = ApiResponse::agent_error(&error);
        assert_eq!(response.status, status);
        assert_eq!(response.error_message(), Some(message.as_str()));
    }

    #[rstest]
    fn ok_serialises_body() {
        let response = ApiResponse::ok(&vec![1, 2, 3]);
        assert!(response.is_success());
        assert_eq!(response.body, json!([1, 2, 3]));
    }
}
