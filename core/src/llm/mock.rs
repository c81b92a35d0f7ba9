//! A scriptable `LlmClient` for tests and examples that don't need a real provider.
//!
//! Returns a fixed assistant message and optional fixed tool calls, or cycles
//! through a short script across successive calls (first returns tool calls,
//! later calls return none, ending the step loop).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AgentError;
use crate::llm::{LlmClient, LlmResponse, LlmUsage, MessageChunk, ToolChoiceMode};
use crate::message::{Message, ToolCall};
use crate::tool::ToolSpec;

/// Mock LLM: fixed assistant text and optional tool_calls, or a two-step script.
pub struct MockLlm {
    content: String,
    tool_calls: Vec<ToolCall>,
    /// When set, the first call returns `(content, tool_calls)`; later calls
    /// return `(second_content, [])`.
    call_count: Option<AtomicUsize>,
    second_content: Option<String>,
    /// When true, `invoke_stream` sends each character as a separate chunk.
    stream_by_char: AtomicBool,
}

impl MockLlm {
    /// Returns one assistant message and one `get_time` tool call.
    pub fn with_get_time_call() -> Self {
        Self::new(
            "I'll check the time.",
            vec![ToolCall { id: "call-1".to_string(), name: "get_time".to_string(), arguments: "{}".to_string() }],
        )
    }

    /// Returns assistant text and no tool calls, ending the step loop immediately.
    pub fn with_no_tool_calls(content: impl Into<String>) -> Self {
        Self::new(content, vec![])
    }

    pub fn new(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            call_count: None,
            second_content: None,
            stream_by_char: AtomicBool::new(false),
        }
    }

    /// First call returns a `get_time` tool call; the second returns no tool calls.
    pub fn first_tools_then_end() -> Self {
        Self {
            content: "I'll check the time.".to_string(),
            tool_calls: vec![ToolCall { id: "call-1".to_string(), name: "get_time".to_string(), arguments: "{}".to_string() }],
            call_count: Some(AtomicUsize::new(0)),
            second_content: Some("The time is as above.".to_string()),
            stream_by_char: AtomicBool::new(false),
        }
    }

    pub fn with_stream_by_char(self) -> Self {
        self.stream_by_char.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(
        &self,
        _messages: &[Message],
        _tools: &[ToolSpec],
        _tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, AgentError> {
        let (content, tool_calls) = match &self.call_count {
            Some(c) => {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    (self.content.clone(), self.tool_calls.clone())
                } else {
                    (self.second_content.as_deref().unwrap_or(&self.content).to_string(), vec![])
                }
            }
            None => (self.content.clone(), self.tool_calls.clone()),
        };
        Ok(LlmResponse { content, tool_calls, usage: Some(LlmUsage::default()) })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmResponse, AgentError> {
        let response = self.invoke(messages, tools, tool_choice).await?;
        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                if self.stream_by_char.load(Ordering::SeqCst) {
                    for c in response.content.chars() {
                        let _ = tx.send(MessageChunk { content: c.to_string() }).await;
                    }
                } else {
                    let _ = tx.send(MessageChunk { content: response.content.clone() }).await;
                }
            }
        }
        Ok(response)
    }
}
