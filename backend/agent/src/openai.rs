use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use logging::excerpt;
use visionproxy_core::{AgentError, AgentRequest, RawAgentOutput, VisionAgent};

use crate::system_prompt::{data_url, user_text, DETECTION_INSTRUCTIONS};

/// Connection settings for a chat-completions compatible vision endpoint.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub base_url: String,
    pub model: String,
    /// `None` when the credential was absent at startup.
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Upper bound on idle pooled connections kept to the endpoint.
    pub max_idle_connections: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            max_idle_connections: 16,
        }
    }
}

/// Vision agent backed by an OpenAI-style `/chat/completions` API.
pub struct OpenAiVisionAgent {
    client: Client,
    settings: AgentSettings,
}

impl OpenAiVisionAgent {
    pub fn new(settings: AgentSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn has_credential(&self) -> bool {
        self.settings.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &AgentRequest) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(DETECTION_INSTRUCTIONS.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: user_text(&request.prompt) },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: data_url(&request.mime_type, &request.image) },
                        },
                    ]),
                },
            ],
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 2048,
            response_format: ResponseFormat { kind: "json_object" },
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> AgentError {
        if err.is_timeout() {
            AgentError::Timeout(self.settings.request_timeout)
        } else {
            AgentError::Network(err.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

/// Maps a non-success HTTP status from the agent to an error kind.
fn classify_status(status: StatusCode, body: &str) -> AgentError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth { status: code },
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => AgentError::Unavailable { status: code },
        _ => AgentError::Rejected { status: Some(code), message: upstream_message(body) },
    }
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .map(|message| excerpt(&message, 200))
        .unwrap_or_else(|| excerpt(body, 200))
}

fn parse_completion(body: &str) -> Result<RawAgentOutput, AgentError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| AgentError::Rejected {
        status: None,
        message: format!("malformed completion envelope: {e}"),
    })?;

    if let Some(error) = response.error {
        return Err(AgentError::Rejected {
            status: None,
            message: error
                .message
                .map(|m| excerpt(&m, 200))
                .unwrap_or_else(|| "unspecified error".into()),
        });
    }

    let choice = response.choices.into_iter().next().ok_or_else(|| AgentError::Rejected {
        status: None,
        message: "completion has no choices".into(),
    })?;

    if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
        return Err(AgentError::Refused(excerpt(&refusal, 200)));
    }

    Ok(RawAgentOutput::Text(choice.message.content.unwrap_or_default()))
}

#[async_trait]
impl VisionAgent for OpenAiVisionAgent {
    fn name(&self) -> &str {
        "openai"
    }

    async fn analyze(&self, request: &AgentRequest) -> Result<RawAgentOutput, AgentError> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            return Err(AgentError::MissingCredential);
        };

        let start = Instant::now();
        let body = self.build_request(request);

        debug!(
            model = %self.settings.model,
            image_bytes = request.image.len(),
            mime = %request.mime_type,
            "Sending detection request to agent"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let err = classify_status(status, &text);
            warn!(status = status.as_u16(), latency_ms, error = %err, "Agent returned an error status");
            return Err(err);
        }

        debug!(latency_ms, response_bytes = text.len(), "Agent answered");
        parse_completion(&text)
    }
}
