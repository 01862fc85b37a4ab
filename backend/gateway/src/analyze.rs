//! `POST /analyze`: validate the upload, ask the agent, normalize its answer.
//!
//! Each request moves through
//! `Received -> ValidatingInput -> CallingAgent -> Normalizing -> Responding`
//! and may stop with an [`ApiError`] at any stage. If the client goes away the
//! handler future is dropped, which also drops the in-flight agent call.

use std::fmt;
use std::time::Instant;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use logging::excerpt;
use visionproxy_core::{AgentError, AgentRequest, DetectionResult, RawAgentOutput};
use visionproxy_normalizer::normalize;

use crate::error::ApiError;
use crate::input::{read_analyze_form, InputError};
use crate::server::GatewayState;

/// Lifecycle of one `/analyze` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    ValidatingInput,
    CallingAgent,
    Normalizing,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::ValidatingInput => "validating_input",
            Self::CallingAgent => "calling_agent",
            Self::Normalizing => "normalizing",
            Self::Responding => "responding",
        };
        f.write_str(s)
    }
}

/// Handler for `POST /analyze`.
pub async fn analyze(
    State(state): State<GatewayState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResult>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("analyze", %request_id);
    handle(&state, multipart).instrument(span).await.map(Json)
}

async fn handle(
    state: &GatewayState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<DetectionResult, ApiError> {
    let started = Instant::now();
    enter(Stage::Received);

    enter(Stage::ValidatingInput);
    let multipart = multipart
        .map_err(|rejection| failed(Stage::ValidatingInput, InputError::Malformed(rejection.body_text()).into()))?;
    let input = read_analyze_form(multipart, &state.limits)
        .await
        .map_err(|e| failed(Stage::ValidatingInput, e.into()))?;
    debug!(
        prompt_chars = input.prompt.chars().count(),
        image_bytes = input.image.len(),
        mime = input.mime_type,
        "Input accepted"
    );

    enter(Stage::CallingAgent);
    let request = input.into_agent_request();
    let raw = call_agent(state, &request)
        .await
        .map_err(|e| failed(Stage::CallingAgent, e.into()))?;

    enter(Stage::Normalizing);
    let normalized = normalize(&raw).map_err(|e| {
        warn!(answer = %excerpt(&raw.as_text(), 300), "Agent answer could not be normalized");
        failed(Stage::Normalizing, e.into())
    })?;
    for adjustment in &normalized.adjustments {
        debug!(%adjustment, "Coerced agent answer");
    }
    if !normalized.adjustments.is_empty() {
        info!(adjustments = normalized.adjustments.len(), "Agent answer needed coercion");
    }

    enter(Stage::Responding);
    let result = normalized.result;
    info!(
        found = result.found(),
        confidence = result.confidence(),
        boxes = result.boxes().len(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Detection complete"
    );
    Ok(result)
}

/// Call the agent, retrying once on a transient transport failure.
async fn call_agent(state: &GatewayState, request: &AgentRequest) -> Result<RawAgentOutput, AgentError> {
    let mut attempt = 1;
    loop {
        match state.agent.analyze(request).await {
            Err(err) if err.is_transient() && state.retry.should_retry(attempt) => {
                let delay = state.retry.delay;
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient agent failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "Entering stage");
}

fn failed(stage: Stage, err: ApiError) -> ApiError {
    let code = err.code();
    if err.status().is_client_error() {
        info!(%stage, %code, error = %err, "Request rejected");
    } else {
        error!(%stage, %code, error = %err, "Request failed");
    }
    err
}
