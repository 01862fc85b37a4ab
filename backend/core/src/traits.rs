use async_trait::async_trait;
use bytes::Bytes;

use crate::error::AgentError;

/// Input for one call to the vision agent.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub prompt: String,
    pub image: Bytes,
    pub mime_type: String,
}

/// Whatever the agent produced. Nothing about its shape is guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAgentOutput {
    /// Free text, possibly wrapping a JSON document.
    Text(String),
    /// Already-parsed structured output.
    Json(serde_json::Value),
}

impl RawAgentOutput {
    /// Text form for logging.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }
}

/// An external vision-reasoning capability.
///
/// Implementations make at most one outbound call per invocation and never retry.
#[async_trait]
pub trait VisionAgent: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn analyze(&self, request: &AgentRequest) -> Result<RawAgentOutput, AgentError>;
}
