//! Structured Logger
//!
//! Console output (plain or JSON) plus an optional daily-rolling NDJSON file,
//! with the level taken from `RUST_LOG` when set.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logger options, usually read from the environment at startup.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Fallback filter when `RUST_LOG` is unset, e.g. `info` or `visionproxy_gateway=debug`.
    pub level: String,
    /// Emit JSON on stdout instead of human-readable lines.
    pub json: bool,
    /// Directory for `visionproxy.log.YYYY-MM-DD` files.
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false, dir: None }
    }
}

/// Initialize the global structured logger. Later calls are ignored.
pub fn init_logger(settings: &LogSettings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let file_layer = settings.dir.as_ref().map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, "visionproxy.log");
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let (json_console, plain_console) = if settings.json {
        (Some(fmt::layer().json().with_writer(std::io::stdout)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stdout).with_target(false)))
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_console)
        .with(plain_console)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        let settings = LogSettings { level: "debug".into(), ..Default::default() };
        init_logger(&settings);
        init_logger(&settings);
        tracing::debug!("logger initialised twice");
    }
}
