//! Socket listener that hands each accepted connection to its own thread.
//!
//! Requests may block for as long as the agent takes to start, so the accept
//! loop never runs handlers itself.

mod errors;
mod handler;
mod listener;

pub(crate) use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::SocketListener;
#[cfg(test)]
pub(crate) use self::listener::ListenerHandle;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::listener");
