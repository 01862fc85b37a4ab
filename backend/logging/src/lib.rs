//! Structured logging for the vision proxy.
//!
//! Sets up the global `tracing` subscriber and scrubs credentials, image
//! payloads and oversized model output before they reach a log line.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LogSettings};
pub use redact::{excerpt, redact_sensitive_data};
