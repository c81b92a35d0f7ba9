//! Bridges this crate's internal event types to the wire-level `stream-event`
//! protocol. Kept as a thin boundary module so `event.rs` and `stream.rs` stay
//! free of any serialization-format concerns; `agent_event_to_envelope_json`
//! converts and stamps session/node/event-sequence metadata in one call.

use serde_json::Value;
use stream_event::{EnvelopeState, ProtocolEvent};

use crate::event::{AgentEvent, EventType};
use crate::stream::StreamEvent;

/// Converts one internal `AgentEvent` into its wire-level `ProtocolEvent`.
///
/// Event types with no direct protocol counterpart (tool/ralph lifecycle events)
/// round-trip through `Custom`, carrying the original type name and payload, so
/// no information is silently dropped at this boundary.
pub fn agent_event_to_protocol(event: &AgentEvent) -> ProtocolEvent {
    let payload = &event.payload;
    match event.event_type {
        EventType::StepStart => ProtocolEvent::StepStart {
            step: field_u32(payload, "step"),
        },
        EventType::StepEnd => ProtocolEvent::StepEnd {
            step: field_u32(payload, "step"),
        },
        EventType::TokenSummary => ProtocolEvent::TokenSummary {
            total_tokens: field_u64(payload, "total_tokens"),
        },
        EventType::UserInputRequired => ProtocolEvent::UserInputRequired {
            tool_call_id: field_string(payload, "tool_call_id"),
        },
        EventType::Completion | EventType::RalphCompletion => ProtocolEvent::Completion {
            content: field_string(payload, "content"),
        },
        EventType::Error => ProtocolEvent::Error {
            message: field_string(payload, "message"),
        },
        other => ProtocolEvent::Custom {
            value: serde_json::json!({ "event_type": event_type_name(other), "payload": payload }),
        },
    }
}

fn event_type_name(event_type: EventType) -> &'static str {
    match event_type {
        EventType::StepStart => "step_start",
        EventType::StepEnd => "step_end",
        EventType::LlmRequest => "llm_request",
        EventType::LlmResponse => "llm_response",
        EventType::ToolStart => "tool_start",
        EventType::ToolEnd => "tool_end",
        EventType::TokenSummary => "token_summary",
        EventType::UserInputRequired => "user_input_required",
        EventType::Completion => "completion",
        EventType::Error => "error",
        EventType::RalphIterationStart => "ralph_iteration_start",
        EventType::RalphIterationEnd => "ralph_iteration_end",
        EventType::RalphCompletion => "ralph_completion",
    }
}

fn field_u32(value: &Value, key: &str) -> u32 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0) as u32
}

fn field_u64(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn field_string(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Converts a graph `StreamEvent<S>` into its wire-level `ProtocolEvent`, serializing
/// the graph state with `serde_json`. Returns `Err` only if `S` fails to serialize.
pub fn stream_event_to_protocol<S>(event: &StreamEvent<S>) -> Result<ProtocolEvent, serde_json::Error>
where
    S: serde::Serialize,
{
    Ok(match event {
        StreamEvent::Values(state) => ProtocolEvent::Values {
            state: serde_json::to_value(state)?,
        },
        StreamEvent::Updates { node_id, channels } => ProtocolEvent::Updates {
            id: node_id.clone(),
            state: channels.clone(),
        },
        StreamEvent::TaskStart { node_id } => ProtocolEvent::NodeEnter { id: node_id.clone() },
        StreamEvent::TaskEnd { node_id, error } => ProtocolEvent::NodeExit {
            id: node_id.clone(),
            result: error
                .clone()
                .map(|e| serde_json::json!({ "error": e }))
                .unwrap_or(Value::Null),
        },
        StreamEvent::Checkpoint(checkpoint) => ProtocolEvent::Checkpoint {
            checkpoint_id: checkpoint.checkpoint_id.clone(),
            timestamp: humantime_or_empty(checkpoint.timestamp),
            step: checkpoint.step as i64,
            state: serde_json::to_value(&checkpoint.state)?,
            thread_id: Some(checkpoint.thread_id.clone()),
            checkpoint_ns: None,
        },
        StreamEvent::Custom(value) => ProtocolEvent::Custom { value: value.clone() },
        StreamEvent::Message { node_id, content } => ProtocolEvent::MessageChunk {
            content: content.clone(),
            id: node_id.clone(),
        },
    })
}

/// Converts and envelopes one `AgentEvent` in a single call, so a caller
/// pushing events over a websocket/SSE channel doesn't have to thread
/// `stream_event::to_json` through by hand at every call site.
pub fn agent_event_to_envelope_json(
    event: &AgentEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    stream_event::to_json(&agent_event_to_protocol(event), state)
}

fn humantime_or_empty(time: std::time::SystemTime) -> String {
    time.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_default()
}
