//! GUP Common Library
//!
//! Shared infrastructure for GUP components, currently the logging setup
//! used by every binary.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod logging;

pub use logging::{init_logging, LogConfig, LogLevel, LogOutput};
