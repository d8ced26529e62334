//! Request line parsing.

use std::io::{self, Read};

use serde::Deserialize;
use serde_json::Value;

use super::errors::DispatchError;

/// Longest accepted request line, newline included.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// One client request.
///
/// ```json
/// {"operation":"get-endpoint-id","params":{"id":1}}
/// ```
///
/// `params` may be omitted for operations that take none.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiRequest {
    operation: String,
    #[serde(default)]
    params: Value,
}

impl ApiRequest {
    /// Parses a request line. Trailing whitespace, including the newline, is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Empty lines and non-JSON are [`DispatchError::MalformedJsonl`]; JSON of
    /// the wrong shape, or a blank operation, is
    /// [`DispatchError::InvalidStructure`].
    pub fn parse(line: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(DispatchError::malformed("empty request line"));
        }
        let request: Self =
            serde_json::from_slice(trimmed).map_err(DispatchError::from_json_error)?;
        if request.operation().is_empty() {
            return Err(DispatchError::invalid_structure("operation field is empty"));
        }
        Ok(request)
    }

    /// Operation name with surrounding whitespace removed.
    #[must_use]
    pub fn operation(&self) -> &str {
        self.operation.trim()
    }

    /// Splits the request into operation name and raw params.
    #[must_use]
    pub fn into_parts(self) -> (String, Value) {
        let operation = self.operation.trim().to_owned();
        (operation, self.params)
    }
}

fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    bytes.get(..end).unwrap_or_default()
}

/// Reads one request line.
///
/// `Ok(None)` means the client closed the connection without sending
/// anything. A final line without a newline is accepted at end of stream.
pub(crate) fn read_request_line(reader: &mut impl Read) -> Result<Option<Vec<u8>>, DispatchError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];

    loop {
        let bytes_read = read_with_retry(reader, &mut chunk)?;
        let Some(read) = chunk.get(..bytes_read).filter(|read| !read.is_empty()) else {
            return Ok(Some(buffer).filter(|line| !line.is_empty()));
        };

        if let Some(newline) = read.iter().position(|byte| *byte == b'\n') {
            buffer.extend_from_slice(&read[..=newline]);
            enforce_limit(buffer.len())?;
            return Ok(Some(buffer));
        }

        buffer.extend_from_slice(read);
        enforce_limit(buffer.len())?;
    }
}

fn read_with_retry(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

fn enforce_limit(size: usize) -> Result<(), DispatchError> {
    if size > MAX_REQUEST_BYTES {
        return Err(DispatchError::request_too_large(size, MAX_REQUEST_BYTES));
    }
    Ok(())
}
