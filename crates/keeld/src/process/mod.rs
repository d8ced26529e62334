//! Process supervision: singleton lock, runtime files, signals and the
//! launch sequence that ties them to the API listener.

use std::time::Duration;

mod errors;
mod files;
mod guard;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::run_daemon;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
/// Time in-flight requests get to finish once shutdown begins.
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(test)]
pub(crate) mod test_support {
    pub(crate) use super::guard::test_support::*;
}
