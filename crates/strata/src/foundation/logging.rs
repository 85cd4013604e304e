//! Logging utilities
//!
//! All diagnostics in this crate go through the `log` facade; this module
//! only wires up a default backend for binaries and tests.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}
