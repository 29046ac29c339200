//! logstreamer-daemon library surface.
//!
//! The binary is a thin wrapper around these modules; they are exposed
//! so integration tests can drive the drain loop without spawning a process.

pub mod cli;
pub mod logging;
pub mod runner;
pub mod sink;

pub use runner::{RunSummary, Runner};
pub use sink::JsonLinesSink;
