//! HTTP server for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use visionproxy_core::VisionAgent;

use crate::analyze;
use crate::health_api;
use crate::input::InputLimits;
use crate::retry::RetryPolicy;

/// Room for the prompt, part headers and boundaries on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub agent: Arc<dyn VisionAgent>,
    /// Whether the agent has a credential to call with.
    pub agent_configured: bool,
    pub limits: InputLimits,
    pub retry: RetryPolicy,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(agent: Arc<dyn VisionAgent>, agent_configured: bool) -> Self {
        Self {
            agent,
            agent_configured,
            limits: InputLimits::default(),
            retry: RetryPolicy::default(),
            started_at: Instant::now(),
        }
    }

    pub fn with_limits(mut self, limits: InputLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

pub fn build_router(state: GatewayState) -> Router {
    let body_limit = state.limits.max_image_bytes.saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/analyze", post(analyze::analyze))
        .route("/api/health", get(health_api::get_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the gateway and serves until ctrl-c.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    if !state.agent_configured {
        warn!("Agent credential missing, /analyze will answer UPSTREAM_UNAVAILABLE");
    }
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
