use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Stable error codes exposed in every failure body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InputInvalid,
    UpstreamUnavailable,
    UpstreamTimeout,
    UpstreamError,
    Unparseable,
    ValidationFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputInvalid => "INPUT_INVALID",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Unparseable => "UNPARSEABLE",
            Self::ValidationFailed => "VALIDATION_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single call to the vision agent.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("agent credential is not configured")]
    MissingCredential,

    #[error("network failure reaching agent: {0}")]
    Network(String),

    #[error("agent rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("agent unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("agent did not answer within {0:?}")]
    Timeout(Duration),

    #[error("agent reported an error (HTTP {status:?}): {message}")]
    Rejected { status: Option<u16>, message: String },

    #[error("agent refused the request: {0}")]
    Refused(String),
}

impl AgentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingCredential
            | Self::Network(_)
            | Self::Auth { .. }
            | Self::Unavailable { .. } => ErrorCode::UpstreamUnavailable,
            Self::Timeout(_) => ErrorCode::UpstreamTimeout,
            Self::Rejected { .. } | Self::Refused(_) => ErrorCode::UpstreamError,
        }
    }

    /// Whether a second attempt may succeed. Only transport-level failures qualify.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::UpstreamTimeout).unwrap();
        assert_eq!(json, "\"UPSTREAM_TIMEOUT\"");
        assert_eq!(ErrorCode::ValidationFailed.to_string(), "VALIDATION_FAILED");
    }

    #[test]
    fn agent_errors_map_to_codes() {
        assert_eq!(AgentError::MissingCredential.code(), ErrorCode::UpstreamUnavailable);
        assert_eq!(AgentError::Auth { status: 401 }.code(), ErrorCode::UpstreamUnavailable);
        assert_eq!(
            AgentError::Timeout(Duration::from_secs(1)).code(),
            ErrorCode::UpstreamTimeout
        );
        assert_eq!(
            AgentError::Rejected { status: Some(400), message: "bad".into() }.code(),
            ErrorCode::UpstreamError
        );
    }

    #[test]
    fn only_network_failures_are_transient() {
        assert!(AgentError::Network("reset".into()).is_transient());
        assert!(!AgentError::MissingCredential.is_transient());
        assert!(!AgentError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!AgentError::Refused("no".into()).is_transient());
    }
}
