//! Message and tool-call types carried in `AgentState::messages`.
//!
//! Role is one of system, user, assistant, tool. Only assistant messages carry
//! an ordered `tool_calls` list; only tool messages carry a `tool_call_id` that
//! correlates the result back to the call that produced it.

use serde::{Deserialize, Serialize};

/// Role of a single message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model, as part of an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates this call with the `tool` message carrying its result.
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments as produced by the model.
    pub arguments: String,
}

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Present only on assistant messages that requested tool calls. Order matters:
    /// it is the order calls are issued in, not necessarily the order they complete in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Present only on tool-role messages; correlates with the `ToolCall::id` it answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant message with tool calls attached. Content may be empty.
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Tool-result message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_role_and_content() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").content, "u");
        assert_eq!(Message::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn tool_message_carries_call_id() {
        let m = Message::tool("call-1", "42");
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn assistant_with_tool_calls_preserves_order() {
        let calls = vec![
            ToolCall { id: "1".into(), name: "a".into(), arguments: "{}".into() },
            ToolCall { id: "2".into(), name: "b".into(), arguments: "{}".into() },
        ];
        let m = Message::assistant_with_tool_calls("", calls.clone());
        assert!(m.has_tool_calls());
        assert_eq!(m.tool_calls.unwrap(), calls);
    }

    #[test]
    fn message_serialize_roundtrip_preserves_optional_fields() {
        let m = Message::tool("call-1", "result");
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_call_id, m.tool_call_id);
        assert_eq!(back.content, m.content);
    }

    #[test]
    fn plain_message_has_no_tool_calls() {
        assert!(!Message::user("hi").has_tool_calls());
    }
}
