//! Gateway Health API

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `ok`, or `degraded` when the agent has no credential.
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub agent: String,
    pub agent_configured: bool,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: if state.agent_configured { "ok" } else { "degraded" },
        service: "visionproxy",
        version: env!("CARGO_PKG_VERSION"),
        agent: state.agent.name().to_string(),
        agent_configured: state.agent_configured,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tokio::net::TcpListener;

    use visionproxy_agent::mock::ScriptedAgent;
    use visionproxy_core::RawAgentOutput;

    use super::*;
    use crate::server::build_router;

    async fn health(configured: bool) -> Value {
        let agent = Arc::new(ScriptedAgent::replying(RawAgentOutput::Text(String::new())));
        let router = build_router(GatewayState::new(agent, configured));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let resp = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        resp.json().await.unwrap()
    }

    #[tokio::test]
    async fn reports_ok_when_configured() {
        let body = health(true).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "visionproxy");
        assert_eq!(body["agent"], "scripted");
        assert_eq!(body["agent_configured"], true);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn reports_degraded_without_credential() {
        let body = health(false).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["agent_configured"], false);
    }
}
