//! Event types shared by every component that publishes to the `EventBus`.
//!
//! Events are observability records: they are immutable once published and
//! never drive control flow inside the orchestrator.

pub mod bus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use bus::{EventBus, EventFilter, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SessionStart,
    UserMessage,
    AgentResponse,
    PhaseChanged,
    QuestionBankReady,
    CoachFeedback,
    SessionEnd,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionStart => "SESSION_START",
            EventType::UserMessage => "USER_MESSAGE",
            EventType::AgentResponse => "AGENT_RESPONSE",
            EventType::PhaseChanged => "PHASE_CHANGED",
            EventType::QuestionBankReady => "QUESTION_BANK_READY",
            EventType::CoachFeedback => "COACH_FEEDBACK",
            EventType::SessionEnd => "SESSION_END",
            EventType::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: EventType,
    /// Name of the publishing component, e.g. "session_manager".
    pub source: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            source: source.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}
