//! LLM integration for Ticketsmith.
//!
//! Talks to an OpenAI-style chat-completion endpoint (Perplexity by default)
//! and recovers a typed epic/story tree from the reply.

pub mod client;
pub mod decode;
pub mod prompt;
pub mod retry;

pub use client::{Analyzer, StructuringClient};
pub use decode::decode_analysis;
pub use retry::RetryPolicy;

use std::time::Duration;

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

/// Default model name.
pub const DEFAULT_MODEL: &str = "sonar-pro";

/// Default per-attempt timeout. Generation dominates request latency.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the structuring client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Operator-supplied system instruction.
    pub system_prompt: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}
