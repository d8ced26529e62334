//! JSONL request dispatch.
//!
//! Each connection carries exactly one request line and receives exactly one
//! response line:
//!
//! ```json
//! {"operation":"get-endpoint-id","params":{"id":1}}
//! {"status":200,"body":{"id":1,"state":"ready","...":"..."}}
//! ```
//!
//! Protocol failures use the same envelope with an error body:
//! `400` for malformed or mis-shaped lines, `404` for unknown operations,
//! `413` for oversized lines and `500` for local IO or encoding failures.

mod errors;
mod handler;
mod request;
mod response;

pub(crate) use self::handler::DispatchConnectionHandler;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
