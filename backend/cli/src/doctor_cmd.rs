//! CLI Doctor Command
//!
//! Checks that the environment can run the gateway.

use anyhow::Result;

use crate::config::Config;

#[derive(Debug, PartialEq, Eq)]
enum Check {
    Pass(String),
    Warn(String),
    Fail(String),
}

/// Executes the full doctor diagnosis. Returns whether every required check passed.
pub fn run(config: &Config) -> Result<bool> {
    println!("\n🔍 Running VisionProxy Doctor...\n");

    let checks = diagnose(config);
    for check in &checks {
        match check {
            Check::Pass(msg) => println!("  🟢 {msg}"),
            Check::Warn(msg) => println!("  🟡 {msg}"),
            Check::Fail(msg) => println!("  🔴 {msg}"),
        }
    }

    let is_ok = !checks.iter().any(|c| matches!(c, Check::Fail(_)));
    println!();
    if is_ok {
        println!("✅ All checks passed! VisionProxy is ready to serve.");
    } else {
        println!("❌ Some checks failed! Please fix the errors above.");
    }
    Ok(is_ok)
}

fn diagnose(config: &Config) -> Vec<Check> {
    let mut checks = Vec::new();

    if config.has_credential() {
        checks.push(Check::Pass("OPENAI_API_KEY is set".into()));
    } else {
        checks.push(Check::Fail(
            "OPENAI_API_KEY is missing (every /analyze call will answer UPSTREAM_UNAVAILABLE)".into(),
        ));
    }

    for warning in &config.warnings {
        checks.push(Check::Warn(warning.clone()));
    }

    match config.validate() {
        Ok(()) => checks.push(Check::Pass(format!(
            "listening on {}:{}, agent {} ({})",
            config.bind_address, config.port, config.agent_url, config.model
        ))),
        Err(e) => checks.push(Check::Fail(e.to_string())),
    }

    if !config.agent_url.starts_with("https://") {
        checks.push(Check::Warn(format!("agent URL {} is not HTTPS", config.agent_url)));
    }

    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_credential_fails() {
        let checks = diagnose(&Config::default());
        assert!(checks.iter().any(|c| matches!(c, Check::Fail(m) if m.contains("OPENAI_API_KEY"))));
    }

    #[test]
    fn healthy_config_passes() {
        let config = Config { api_key: Some("sk-test".into()), ..Config::default() };
        assert!(diagnose(&config).iter().all(|c| matches!(c, Check::Pass(_))));
    }

    #[test]
    fn invalid_settings_fail() {
        let config = Config {
            api_key: Some("sk-test".into()),
            agent_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(diagnose(&config).iter().any(|c| matches!(c, Check::Fail(_))));
    }
}
