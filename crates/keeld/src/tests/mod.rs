//! Test suites for the keel daemon.

mod deferred_behaviour;
mod support;
mod unit;
