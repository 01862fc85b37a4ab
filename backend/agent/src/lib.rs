//! Vision agent adapter.
//!
//! [`OpenAiVisionAgent`] talks to a chat-completions compatible endpoint,
//! [`GuardedAgent`] bounds any agent in time and concurrency, and
//! [`mock::ScriptedAgent`] stands in for the network in tests.

pub mod guarded;
pub mod mock;
pub mod openai;
pub mod system_prompt;

pub use guarded::GuardedAgent;
pub use openai::{AgentSettings, OpenAiVisionAgent};
