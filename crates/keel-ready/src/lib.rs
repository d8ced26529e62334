//! Write-once values for objects that become available after startup.
//!
//! A [`ReadyValue`] starts pending and is settled exactly once through its
//! [`Resolver`], either with a value or with a terminal error. Any number of
//! threads may [`wait`](ReadyValue::wait) on clones of the same value; they
//! all observe the same outcome and none of them can trigger or repeat the
//! work that produces it.
//!
//! ```
//! use std::thread;
//!
//! use keel_ready::{ReadyValue, WaitContext};
//!
//! let (value, resolver) = ReadyValue::<u32, String>::new();
//! let reader = value.clone();
//! let waiter = thread::spawn(move || reader.wait(&WaitContext::background()));
//!
//! resolver.resolve(7).expect("first settlement wins");
//! assert_eq!(waiter.join().expect("waiter thread"), Ok(7));
//! assert_eq!(value.wait(&WaitContext::background()), Ok(7));
//! ```
//!
//! Waiting callers bound their own patience with a [`WaitContext`], which
//! may carry a [`CancelToken`] and a deadline. Giving up never settles the
//! value for anybody else.

mod cancel;
mod context;
mod error;
mod value;

pub use cancel::CancelToken;
pub use context::WaitContext;
pub use error::{AlreadySettled, WaitError};
pub use value::{ReadyState, ReadyValue, Resolver};

/// Tracing target for settlement and cancellation events.
pub const READY_TARGET: &str = env!("CARGO_PKG_NAME");
