//! Connection handler that answers one JSONL request per connection.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiResponse, HandlerSet};
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::{ApiRequest, read_request_line};
use super::response::ResponseWriter;

/// Routes request lines to the [`HandlerSet`].
///
/// The handler runs on the connection's own thread and may block there
/// while the operation waits for the agent.
#[derive(Debug, Clone)]
pub struct DispatchConnectionHandler {
    handlers: Arc<HandlerSet>,
}

impl DispatchConnectionHandler {
    /// Serves requests from `handlers`.
    pub const fn new(handlers: Arc<HandlerSet>) -> Self {
        Self { handlers }
    }

    /// Answers one raw request line.
    pub(crate) fn answer(&self, line: &[u8]) -> Result<ApiResponse, DispatchError> {
        let (operation, params) = ApiRequest::parse(line)?.into_parts();
        debug!(target: DISPATCH_TARGET, operation = %operation, "dispatching request");
        let response = self
            .handlers
            .dispatch(&operation, params)
            .ok_or_else(|| DispatchError::unknown_operation(&operation))?;
        debug!(
            target: DISPATCH_TARGET,
            operation = %operation,
            status = response.status,
            "request answered"
        );
        Ok(response)
    }

    fn serve(&self, stream: &mut ConnectionStream) -> Result<(), DispatchError> {
        let Some(line) = read_request_line(stream)? else {
            debug!(target: DISPATCH_TARGET, "client disconnected without request");
            return Ok(());
        };
        let mut writer = ResponseWriter::new(stream);
        match self.answer(&line) {
            Ok(response) => writer.write_response(&response),
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "request rejected");
                writer.write_error(&error)
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let Err(error) = self.serve(&mut stream) else {
            return;
        };
        warn!(target: DISPATCH_TARGET, %error, "failed to serve connection");
        // Reading may have failed before any reply; try to tell the client.
        if matches!(error, DispatchError::RequestTooLarge { .. } | DispatchError::Io(_))
            && let Err(write_error) = ResponseWriter::new(&mut stream).write_error(&error)
        {
            debug!(
                target: DISPATCH_TARGET,
                error = %write_error,
                "could not report failure to client"
            );
        }
    }
}
