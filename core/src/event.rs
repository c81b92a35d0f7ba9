//! Event bus (C3): typed run events with wildcard and typed subscribers.
//!
//! Subscribers registered for a wildcard are delivered before subscribers
//! registered for the event's exact type, and delivery within each group
//! follows registration order. Delivery is synchronous and sequential — there
//! is no internal buffering or fan-out thread.

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

/// Event type discriminant. `StepEnd`, `TokenSummary` and `LlmRequest` are not named
/// in the distilled step-loop description but are emitted by the original agent loop
/// and are kept here because they're load-bearing for any UI that renders a run live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StepStart,
    StepEnd,
    LlmRequest,
    LlmResponse,
    ToolStart,
    ToolEnd,
    TokenSummary,
    UserInputRequired,
    Completion,
    Error,
    RalphIterationStart,
    RalphIterationEnd,
    RalphCompletion,
}

/// One emitted event: type plus an arbitrary JSON payload.
#[derive(Debug, Clone)]
pub struct AgentEvent {
    pub event_type: EventType,
    pub payload: Value,
}

impl AgentEvent {
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self { event_type, payload }
    }
}

type Subscriber = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

enum Registration {
    Wildcard(Subscriber),
    Typed(EventType, Subscriber),
}

/// Registers subscribers and delivers events to them in order: all wildcard
/// subscribers first (registration order), then all subscribers typed for the
/// event's exact `EventType` (registration order).
#[derive(Default)]
pub struct EventBus {
    registrations: Mutex<Vec<Registration>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe_all<F>(&self, callback: F)
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.registrations
            .lock()
            .await
            .push(Registration::Wildcard(Arc::new(callback)));
    }

    pub async fn subscribe<F>(&self, event_type: EventType, callback: F)
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.registrations
            .lock()
            .await
            .push(Registration::Typed(event_type, Arc::new(callback)));
    }

    /// Delivers `event` to wildcard subscribers, then typed subscribers, both in
    /// registration order. Never fails: a panicking subscriber is a bug in the
    /// subscriber, not something this method defends against.
    pub async fn emit(&self, event: AgentEvent) {
        let registrations = self.registrations.lock().await;
        for reg in registrations.iter() {
            if let Registration::Wildcard(cb) = reg {
                cb(&event);
            }
        }
        for reg in registrations.iter() {
            if let Registration::Typed(t, cb) = reg {
                if *t == event.event_type {
                    cb(&event);
                }
            }
        }
    }
}
