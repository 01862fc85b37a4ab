//! Deterministic stand-in for the vision agent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use visionproxy_core::{AgentError, AgentRequest, RawAgentOutput, VisionAgent};

type Outcome = Result<RawAgentOutput, AgentError>;

/// Replays scripted outcomes in order; the last one repeats once the script runs out.
pub struct ScriptedAgent {
    script: Mutex<VecDeque<Outcome>>,
    last: Mutex<Outcome>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        let mut script: VecDeque<Outcome> = outcomes.into();
        let last = script
            .pop_back()
            .unwrap_or_else(|| Ok(RawAgentOutput::Text(String::new())));
        script.push_back(last.clone());
        Self {
            script: Mutex::new(script),
            last: Mutex::new(last),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(output: RawAgentOutput) -> Self {
        Self::new(vec![Ok(output)])
    }

    pub fn failing(error: AgentError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `analyze` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Outcome {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        match script.pop_front() {
            Some(outcome) => outcome,
            None => self.last.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}

#[async_trait]
impl VisionAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, _request: &AgentRequest) -> Result<RawAgentOutput, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn replays_script_then_repeats_last() {
        let agent = ScriptedAgent::new(vec![
            Err(AgentError::Network("reset".into())),
            Ok(RawAgentOutput::Text("ok".into())),
        ]);
        let request =
            AgentRequest { prompt: "p".into(), image: Bytes::new(), mime_type: "image/png".into() };

        assert!(agent.analyze(&request).await.is_err());
        assert_eq!(agent.analyze(&request).await.unwrap(), RawAgentOutput::Text("ok".into()));
        assert_eq!(agent.analyze(&request).await.unwrap(), RawAgentOutput::Text("ok".into()));
        assert_eq!(agent.calls(), 3);
    }
}
