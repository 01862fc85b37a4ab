//! VisionProxy HTTP gateway.
//!
//! Accepts `POST /analyze` uploads, forwards them to a vision agent and
//! answers with a validated detection result or a structured error.

pub mod analyze;
pub mod error;
pub mod health_api;
pub mod input;
pub mod retry;
pub mod server;

pub use error::{ApiError, ErrorBody};
pub use input::InputLimits;
pub use retry::RetryPolicy;
pub use server::{build_router, start_server, GatewayState};
