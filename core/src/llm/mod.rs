//! LLM client contract (C2): the seam between the step loop and a model provider.
//!
//! Concrete providers and routing between them are out of scope here — this module
//! defines only the trait, the response shape, and the retry/backoff wrapper every
//! provider runs behind.

pub mod mock;
mod retry;

pub use retry::{retry_invoke, RetryConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::message::{Message, ToolCall};
use crate::tool::ToolSpec;

/// How the model should be constrained with respect to calling tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

impl std::str::FromStr for ToolChoiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            "required" => Ok(Self::Required),
            other => Err(format!("unknown tool choice mode: {other}")),
        }
    }
}

/// Token accounting for one LLM call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl std::ops::Add for LlmUsage {
    type Output = LlmUsage;

    fn add(self, rhs: Self) -> Self::Output {
        LlmUsage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

/// One assistant turn: text content plus any tool calls requested alongside it.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
}

/// A streamed chunk of model output, as `tracing`-visible progress during a step.
#[derive(Debug, Clone)]
pub struct MessageChunk {
    pub content: String,
}

/// The contract a model provider must satisfy to back the step loop.
///
/// `invoke` is the only method every provider must implement; `invoke_stream`
/// defaults to sending the full response as a single chunk so providers that
/// don't support token streaming still work everywhere a streaming caller expects one.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, AgentError>;

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        chunk_tx: Option<tokio::sync::mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmResponse, AgentError> {
        let response = self.invoke(messages, tools, tool_choice).await?;
        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                let _ = tx
                    .send(MessageChunk {
                        content: response.content.clone(),
                    })
                    .await;
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_choice_mode_parses_known_values() {
        assert_eq!("auto".parse::<ToolChoiceMode>().unwrap(), ToolChoiceMode::Auto);
        assert_eq!("none".parse::<ToolChoiceMode>().unwrap(), ToolChoiceMode::None);
        assert_eq!(
            "required".parse::<ToolChoiceMode>().unwrap(),
            ToolChoiceMode::Required
        );
        assert!("bogus".parse::<ToolChoiceMode>().is_err());
    }

    #[test]
    fn usage_add_sums_fields() {
        let a = LlmUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 };
        let b = LlmUsage { prompt_tokens: 3, completion_tokens: 2, total_tokens: 5 };
        let sum = a + b;
        assert_eq!(sum.total_tokens, 20);
    }
}
