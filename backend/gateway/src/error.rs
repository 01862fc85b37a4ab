//! Error responses.
//!
//! Every failure leaves the gateway as `{"error": CODE, "detail": "..."}`.
//! Details are written here, never copied from the agent's answer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use visionproxy_core::{AgentError, ErrorCode};
use visionproxy_normalizer::NormalizeError;

use crate::input::InputError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Input(_) => ErrorCode::InputInvalid,
            Self::Agent(e) => e.code(),
            Self::Normalize(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input(e) => e.status(),
            Self::Agent(e) => match e.code() {
                ErrorCode::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Normalize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing description.
    pub fn public_detail(&self) -> String {
        match self {
            Self::Input(e) => e.to_string(),
            Self::Agent(e) => match e {
                AgentError::MissingCredential => "agent credential is not configured".into(),
                AgentError::Network(_) => "agent could not be reached".into(),
                AgentError::Auth { .. } => "agent rejected the configured credential".into(),
                AgentError::Unavailable { .. } => "agent is temporarily unavailable".into(),
                AgentError::Timeout(limit) => {
                    format!("agent did not answer within {} ms", limit.as_millis())
                }
                AgentError::Rejected { .. } => "agent reported an error".into(),
                AgentError::Refused(_) => "agent declined to analyze the image".into(),
            },
            Self::Normalize(NormalizeError::Unparseable(reason)) => reason.clone(),
            Self::Normalize(NormalizeError::ValidationFailed(v)) => {
                format!("{} on `{}`", v.kind, v.field)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.code(), detail: Some(self.public_detail()) };
        (self.status(), Json(body)).into_response()
    }
}
