mod config;
mod doctor_cmd;
mod status_cmd;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use visionproxy_agent::{GuardedAgent, OpenAiVisionAgent};
use visionproxy_gateway::{start_server, GatewayState};

use config::Config;

#[derive(Parser)]
#[command(name = "visionproxy")]
#[command(about = "VisionProxy: prompt-driven object detection over a vision agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the detection gateway
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Query a running instance's health endpoint
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check the environment
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Serve { port } => {
            let config = Config { port: port.unwrap_or(config.port), ..config };
            logging::init_logger(&config.log_settings());
            run_server(config).await?;
        }
        Commands::Status { port } => {
            status_cmd::run(port.unwrap_or(config.port)).await?;
        }
        Commands::Doctor => {
            if !doctor_cmd::run(&config)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    for warning in &config.warnings {
        warn!("{warning}");
    }
    config.validate()?;
    let addr = config.socket_addr()?;

    info!(
        %addr,
        agent_url = %config.agent_url,
        model = %config.model,
        timeout_secs = config.agent_timeout.as_secs(),
        max_concurrent_calls = config.max_concurrent_calls,
        "Starting VisionProxy"
    );
    if !config.has_credential() {
        warn!("OPENAI_API_KEY is not set; detection requests will fail with UPSTREAM_UNAVAILABLE");
    }

    let agent = OpenAiVisionAgent::new(config.agent_settings()).context("building agent HTTP client")?;
    let agent = GuardedAgent::new(agent, config.max_concurrent_calls, config.agent_timeout);

    let state = GatewayState::new(Arc::new(agent), config.has_credential())
        .with_limits(config.input_limits())
        .with_retry(config.retry_policy());

    start_server(addr, state).await
}
