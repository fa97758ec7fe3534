use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::feedback::{FeedbackRecord, FinalSummary};
use crate::models::interview::{InterviewState, Phase};
use crate::models::session::{Role, SessionConfig, Turn};

/// Per-turn feedback keyed by the answering user turn's history index.
/// Written concurrently by background evaluations; an index is filled once
/// and never overwritten.
#[derive(Debug, Default)]
pub struct FeedbackLog {
    records: Mutex<BTreeMap<usize, FeedbackRecord>>,
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` unless its turn already has one. Returns whether it was stored.
    pub fn record(&self, record: FeedbackRecord) -> bool {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records.entry(record.turn_index) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, turn_index: usize) -> bool {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&turn_index)
    }

    /// Records in turn order.
    pub fn snapshot(&self) -> Vec<FeedbackRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Record for the most recent answered turn that has been evaluated.
    pub fn latest(&self) -> Option<FeedbackRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .next_back()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn fallback_count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.is_fallback)
            .count()
    }
}

/// A background evaluation for one answered turn.
#[derive(Debug)]
pub struct PendingEvaluation {
    pub turn_index: usize,
    pub question: String,
    pub answer: String,
    pub handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub timed_responses: u64,
    pub total_processing_ms: u64,
}

impl Counters {
    pub fn record_response(&mut self, elapsed: Duration) {
        self.assistant_messages += 1;
        self.timed_responses += 1;
        self.total_processing_ms += elapsed.as_millis() as u64;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsRecord {
    pub session_id: Uuid,
    pub phase: Phase,
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub questions_asked: usize,
    pub follow_ups_asked: u32,
    pub answered_turns: usize,
    pub feedback_completed: usize,
    pub feedback_fallbacks: usize,
    pub total_processing_ms: u64,
    pub average_response_ms: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: i64,
}

/// Result of `end_interview`, cached so repeated calls return it unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewResult {
    pub session_id: Uuid,
    pub final_summary: FinalSummary,
    pub per_turn_feedback: Vec<FeedbackRecord>,
}

/// One interview. Owned by the `SessionManager`; agents mutate it only
/// through `&mut Session` while the manager holds the session lock.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub config: Arc<SessionConfig>,
    pub state: InterviewState,
    history: Vec<Turn>,
    pub feedback_log: Arc<FeedbackLog>,
    pub pending: Vec<PendingEvaluation>,
    pub answered_turns: usize,
    pub counters: Counters,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Set once by the first `end_interview`; later calls wait on it.
    pub result: Arc<OnceCell<InterviewResult>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config: Arc::new(config),
            state: InterviewState::new(),
            history: Vec::new(),
            feedback_log: Arc::new(FeedbackLog::new()),
            pending: Vec::new(),
            answered_turns: 0,
            counters: Counters::default(),
            created_at: Utc::now(),
            ended_at: None,
            result: Arc::new(OnceCell::new()),
        }
    }

    /// Appends to the history and returns the turn's index. Turns are never
    /// edited or removed.
    pub fn append(&mut self, turn: Turn) -> usize {
        self.history.push(turn);
        self.history.len() - 1
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .and_then(Turn::text)
    }

    pub fn stats(&self) -> StatsRecord {
        let answered_fallbacks = self.feedback_log.fallback_count();
        let average_response_ms = match self.counters.timed_responses {
            0 => 0,
            n => self.counters.total_processing_ms / n,
        };
        let until = self.ended_at.unwrap_or_else(Utc::now);
        StatsRecord {
            session_id: self.id,
            phase: self.state.phase,
            user_messages: self.counters.user_messages,
            assistant_messages: self.counters.assistant_messages,
            questions_asked: self.state.asked_count,
            follow_ups_asked: self.state.follow_ups_asked,
            answered_turns: self.answered_turns,
            feedback_completed: self.feedback_log.len() - answered_fallbacks,
            feedback_fallbacks: answered_fallbacks,
            total_processing_ms: self.counters.total_processing_ms,
            average_response_ms,
            started_at: self.created_at,
            ended_at: self.ended_at,
            elapsed_seconds: (until - self.created_at).num_seconds().max(0),
        }
    }
}
