//! Writes the single response line.

use std::io::Write;

use crate::api::ApiResponse;

use super::errors::DispatchError;

/// Frames [`ApiResponse`] values as JSONL.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps `writer`.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes `response` followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Fails if encoding or writing fails.
    pub fn write_response(&mut self, response: &ApiResponse) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, response)
            .map_err(DispatchError::SerializeResponse)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes `error` as an error response with its own status.
    ///
    /// # Errors
    ///
    /// Fails if encoding or writing fails.
    pub fn write_error(&mut self, error: &DispatchError) -> Result<(), DispatchError> {
        self.write_response(&ApiResponse::error(error.status(), error))
    }
}
