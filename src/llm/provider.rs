//! Model adapter contract. Providers deliver raw output; they never parse
//! actions themselves; the step engine applies the normalization entry
//! point matching the provider's declared [`ParseMode`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AgentResult;
use crate::parser::ToolInvocation;
use crate::perception::Frame;

/// Which normalization path a provider's output goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Pseudo-XML tagged text.
    Tagged,
    /// Structured function/tool calls.
    ToolCall,
}

impl Default for ParseMode {
    fn default() -> Self {
        ParseMode::Tagged
    }
}

/// Per-call parameters, fixed at run start.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt += other.prompt;
        self.completion += other.completion;
        self.total += other.total;
    }
}

/// What one model call produced, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawModelOutput {
    /// Assistant text content (tagged-text providers put everything here).
    pub text: String,
    /// API-level reasoning text, when the model exposes it separately.
    pub reasoning: Option<String>,
    /// Structured tool calls, already decoupled from the wire format.
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Option<TokenUsage>,
}

/// Streaming reasoning callback: `(delta, accumulated)`. Called zero or
/// more times before `call` returns; must not block.
pub type ReasoningCallback<'a> = &'a (dyn Fn(&str, &str) + Send + Sync);

#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    fn parse_mode(&self) -> ParseMode;

    /// One model invocation with the current screenshot attached.
    ///
    /// A rate-limited upstream must surface as
    /// [`AgentError::RateLimited`](crate::errors::AgentError::RateLimited)
    /// so the engine can apply bounded backoff; any other error terminates
    /// the run.
    async fn call(
        &self,
        system_prompt: &str,
        user_text: &str,
        frame: &Frame,
        cfg: &CallConfig,
        on_reasoning: Option<ReasoningCallback<'_>>,
    ) -> AgentResult<RawModelOutput>;
}
