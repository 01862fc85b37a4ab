use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::Semaphore;

use logging::LogSettings;
use visionproxy_agent::AgentSettings;
use visionproxy_gateway::{InputLimits, RetryPolicy};

/// VisionProxy runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Agent credential
    pub api_key: Option<String>,
    /// Chat-completions base URL
    pub agent_url: String,
    pub model: String,
    pub agent_timeout: Duration,
    pub max_concurrent_calls: usize,
    pub max_image_bytes: usize,
    pub retry_delay: Duration,
    /// Log level
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<PathBuf>,
    /// Values that failed to parse and were replaced by defaults. Reported once
    /// logging is up.
    pub warnings: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let agent = AgentSettings::default();
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            api_key: None,
            agent_url: agent.base_url,
            model: agent.model,
            agent_timeout: agent.request_timeout,
            max_concurrent_calls: agent.max_idle_connections,
            max_image_bytes: InputLimits::default().max_image_bytes,
            retry_delay: RetryPolicy::default().delay,
            log_level: "info".to_string(),
            log_json: false,
            log_dir: None,
            warnings: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut warnings = Vec::new();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut numeric = |key: &str, default: u64| -> u64 {
            match text(key) {
                None => default,
                Some(raw) => parse_or_warn(key, &raw, default, &mut warnings),
            }
        };

        let port = numeric("VISIONPROXY_PORT", u64::from(defaults.port));
        let agent_timeout = numeric("VISIONPROXY_AGENT_TIMEOUT_SECS", defaults.agent_timeout.as_secs());
        let max_concurrent_calls = numeric("VISIONPROXY_MAX_CONCURRENT_CALLS", defaults.max_concurrent_calls as u64);
        let max_image_bytes = numeric("VISIONPROXY_MAX_IMAGE_BYTES", defaults.max_image_bytes as u64);
        let retry_delay = numeric("VISIONPROXY_RETRY_DELAY_MS", defaults.retry_delay.as_millis() as u64);

        let port = u16::try_from(port).unwrap_or_else(|_| {
            warnings.push(format!("VISIONPROXY_PORT={port} is out of range, using {}", defaults.port));
            defaults.port
        });

        Self {
            bind_address: text("VISIONPROXY_BIND").unwrap_or(defaults.bind_address),
            port,
            api_key: text("OPENAI_API_KEY"),
            agent_url: text("VISIONPROXY_AGENT_URL").unwrap_or(defaults.agent_url),
            model: text("VISIONPROXY_MODEL").unwrap_or(defaults.model),
            agent_timeout: Duration::from_secs(agent_timeout),
            max_concurrent_calls: max_concurrent_calls as usize,
            max_image_bytes: max_image_bytes as usize,
            retry_delay: Duration::from_millis(retry_delay),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            log_json: text("VISIONPROXY_LOG_JSON").is_some_and(|v| is_truthy(&v)),
            log_dir: text("VISIONPROXY_LOG_DIR").map(PathBuf::from),
            warnings,
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent_timeout.is_zero() {
            bail!("VISIONPROXY_AGENT_TIMEOUT_SECS must be greater than zero");
        }
        if self.max_concurrent_calls == 0 {
            bail!("VISIONPROXY_MAX_CONCURRENT_CALLS must be greater than zero");
        }
        if self.max_concurrent_calls > Semaphore::MAX_PERMITS {
            bail!("VISIONPROXY_MAX_CONCURRENT_CALLS must not exceed {}", Semaphore::MAX_PERMITS);
        }
        if self.max_image_bytes == 0 {
            bail!("VISIONPROXY_MAX_IMAGE_BYTES must be greater than zero");
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = IpAddr::from_str(&self.bind_address)
            .with_context(|| format!("invalid VISIONPROXY_BIND address `{}`", self.bind_address))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings { level: self.log_level.clone(), json: self.log_json, dir: self.log_dir.clone() }
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            base_url: self.agent_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            request_timeout: self.agent_timeout,
            max_idle_connections: self.max_concurrent_calls,
        }
    }

    pub fn input_limits(&self) -> InputLimits {
        InputLimits { max_image_bytes: self.max_image_bytes, ..InputLimits::default() }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_delay(self.retry_delay)
    }
}

fn parse_or_warn(key: &str, raw: &str, default: u64, warnings: &mut Vec<String>) -> u64 {
    raw.parse().unwrap_or_else(|_| {
        warnings.push(format!("{key}={raw:?} is not a valid number, using {default}"));
        default
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.agent_timeout, Duration::from_secs(30));
        assert_eq!(config.max_image_bytes, 10 * 1024 * 1024);
        assert!(!config.has_credential());
        assert!(config.warnings.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("VISIONPROXY_PORT", "9090"),
            ("VISIONPROXY_AGENT_TIMEOUT_SECS", "5"),
            ("VISIONPROXY_LOG_JSON", "true"),
            ("VISIONPROXY_RETRY_DELAY_MS", "10"),
        ]);
        assert!(config.has_credential());
        assert_eq!(config.socket_addr().unwrap().port(), 9090);
        assert_eq!(config.agent_settings().request_timeout, Duration::from_secs(5));
        assert!(config.log_settings().json);
        assert_eq!(config.retry_policy().delay, Duration::from_millis(10));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        assert!(!config_from(&[("OPENAI_API_KEY", "  ")]).has_credential());
    }

    #[test]
    fn invalid_numbers_fall_back_with_warning() {
        let config = config_from(&[("VISIONPROXY_PORT", "eighty"), ("VISIONPROXY_MAX_CONCURRENT_CALLS", "-1")]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_concurrent_calls, 16);
        assert_eq!(config.warnings.len(), 2);
    }

    #[test]
    fn zero_timeout_or_concurrency_is_rejected() {
        assert!(config_from(&[("VISIONPROXY_AGENT_TIMEOUT_SECS", "0")]).validate().is_err());
        assert!(config_from(&[("VISIONPROXY_MAX_CONCURRENT_CALLS", "0")]).validate().is_err());
        assert!(config_from(&[("VISIONPROXY_BIND", "not-an-ip")]).validate().is_err());
    }

    #[test]
    fn concurrency_above_semaphore_capacity_is_rejected() {
        let too_many = (Semaphore::MAX_PERMITS as u64 + 1).to_string();
        let config = config_from(&[("VISIONPROXY_MAX_CONCURRENT_CALLS", too_many.as_str())]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
        assert!(config_from(&[("VISIONPROXY_MAX_CONCURRENT_CALLS", "64")]).validate().is_ok());
    }
}
