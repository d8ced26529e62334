//! Failures that stop a request before any operation answers it.

use std::io;

use thiserror::Error;

/// Errors surfaced while reading, parsing or answering a request line.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The line is not JSON.
    #[error("malformed JSONL: {message}")]
    MalformedJsonl {
        /// Parser message.
        message: String,
        /// Parser error, when there is one.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The JSON does not have the request shape.
    #[error("invalid request structure: {message}")]
    InvalidStructure {
        /// What was wrong.
        message: String,
    },

    /// No handler is registered for the operation.
    #[error("unknown operation '{operation}'")]
    UnknownOperation {
        /// Requested operation.
        operation: String,
    },

    /// The line exceeded the size limit before a newline arrived.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Bytes read so far.
        size: usize,
        /// Limit.
        max_size: usize,
    },

    /// Reading or writing the connection failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The response could not be encoded.
    #[error("failed to serialise response: {0}")]
    SerializeResponse(#[source] serde_json::Error),
}

impl DispatchError {
    /// Status sent to the client for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::MalformedJsonl { .. } | Self::InvalidStructure { .. } => 400,
            Self::UnknownOperation { .. } => 404,
            Self::RequestTooLarge { .. } => 413,
            Self::Io(_) | Self::SerializeResponse(_) => 500,
        }
    }

    /// Classifies a serde error from request parsing.
    ///
    /// Syntax errors mean the line was not JSON; data errors mean it was JSON
    /// of the wrong shape.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        if source.is_data() {
            return Self::invalid_structure(source.to_string());
        }
        Self::MalformedJsonl {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Malformed line with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJsonl {
            message: message.into(),
            source: None,
        }
    }

    /// Wrong request shape.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Unregistered operation.
    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    /// Oversized line.
    pub const fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::syntax("{not json", 400)]
    #[case::shape(r#"{"operation": 5}"#, 400)]
    fn json_errors_are_client_errors(#[case] input: &str, #[case] status: u16) {
        let error = serde_json::from_str::<super::super::request::ApiRequest>(input)
            .map_err(DispatchError::from_json_error)
            .expect_err("should not parse");
        assert_eq!(error.status(), status);
    }

    #[rstest]
    fn oversize_is_413() {
        assert_eq!(DispatchError::request_too_large(10, 5).status(), 413);
    }
}
