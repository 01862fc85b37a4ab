pub mod error;
pub mod schema;
pub mod traits;

pub use error::{AgentError, ErrorCode};
pub use schema::{BoundingBox, DetectionResult, ValidationError, ValidationErrorKind, EXTENT_EPSILON};
pub use traits::{AgentRequest, RawAgentOutput, VisionAgent};
