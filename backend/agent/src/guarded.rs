//! Time and concurrency bounds around an agent.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::warn;

use visionproxy_core::{AgentError, AgentRequest, RawAgentOutput, VisionAgent};

/// Wraps an agent so that at most `max_concurrent` calls are in flight and no
/// call, including the wait for a free slot, outlives `timeout`.
///
/// Dropping the returned future cancels the outbound call.
pub struct GuardedAgent<A> {
    inner: A,
    permits: Semaphore,
    timeout: Duration,
}

impl<A: VisionAgent> GuardedAgent<A> {
    pub fn new(inner: A, max_concurrent: usize, timeout: Duration) -> Self {
        Self { inner, permits: Semaphore::new(max_concurrent), timeout }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Call slots not currently taken.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl<A: VisionAgent> VisionAgent for GuardedAgent<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn analyze(&self, request: &AgentRequest) -> Result<RawAgentOutput, AgentError> {
        let call = async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| AgentError::Network("agent call pool is closed".into()))?;
            self.inner.analyze(request).await
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(agent = self.inner.name(), timeout_ms = self.timeout.as_millis() as u64, "Agent call timed out");
                Err(AgentError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use bytes::Bytes;

    use crate::mock::ScriptedAgent;

    fn request() -> AgentRequest {
        AgentRequest { prompt: "cat".into(), image: Bytes::new(), mime_type: "image/png".into() }
    }

    #[tokio::test]
    async fn passes_through_fast_answers() {
        let agent = GuardedAgent::new(
            ScriptedAgent::replying(RawAgentOutput::Text("{}".into())),
            2,
            Duration::from_secs(1),
        );
        assert_eq!(agent.analyze(&request()).await.unwrap(), RawAgentOutput::Text("{}".into()));
        assert_eq!(agent.available_slots(), 2);
        assert_eq!(agent.inner().calls(), 1);
    }

    #[tokio::test]
    async fn slow_agent_times_out_within_bound() {
        let agent = GuardedAgent::new(
            ScriptedAgent::replying(RawAgentOutput::Text("{}".into()))
                .with_delay(Duration::from_secs(10)),
            1,
            Duration::from_millis(50),
        );
        let start = Instant::now();
        let err = agent.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(agent.available_slots(), 1, "permit released after timeout");
    }

    #[tokio::test]
    async fn waiting_for_a_slot_counts_against_the_timeout() {
        let agent = Arc::new(GuardedAgent::new(
            ScriptedAgent::replying(RawAgentOutput::Text("{}".into()))
                .with_delay(Duration::from_millis(300)),
            1,
            Duration::from_millis(500),
        ));

        let req = request();
        let (a, b) = tokio::join!(agent.analyze(&req), agent.analyze(&req));
        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(agent.inner().calls(), 2);
    }
}
