use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::Turn;

/// Coarse interview lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Initializing,
    Introducing,
    Questioning,
    Completed,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Initializing => Some(Phase::Introducing),
            Phase::Introducing => Some(Phase::Questioning),
            Phase::Questioning => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    Template,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub source: QuestionSource,
    pub justification: Option<String>,
}

impl Question {
    pub fn template(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: QuestionSource::Template,
            justification: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub at: DateTime<Utc>,
}

/// Interviewer-owned state. `asked_count` indexes into `question_bank`;
/// the bank itself is never shrunk once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewState {
    pub phase: Phase,
    pub question_bank: Vec<Question>,
    pub asked_count: usize,
    /// Last question put to the candidate (new or follow-up), awaiting an answer.
    pub pending_question: Option<String>,
    pub follow_ups_on_current: u32,
    pub follow_ups_asked: u32,
    /// Set once on completion and returned verbatim afterwards.
    pub closing_turn: Option<Turn>,
    pub phase_history: Vec<PhaseTransition>,
}

impl Default for InterviewState {
    fn default() -> Self {
        Self::new()
    }
}

impl InterviewState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            question_bank: Vec::new(),
            asked_count: 0,
            pending_question: None,
            follow_ups_on_current: 0,
            follow_ups_asked: 0,
            closing_turn: None,
            phase_history: Vec::new(),
        }
    }

    /// Moves to the next phase. Returns the new phase, or `None` when
    /// already COMPLETED.
    pub fn advance(&mut self) -> Option<Phase> {
        let to = self.phase.next()?;
        self.phase_history.push(PhaseTransition {
            from: self.phase,
            to,
            at: Utc::now(),
        });
        self.phase = to;
        Some(to)
    }

    /// Takes the next unasked bank question and counts it as asked.
    pub fn take_next_question(&mut self) -> Option<Question> {
        let question = self.question_bank.get(self.asked_count)?.clone();
        self.asked_count += 1;
        self.follow_ups_on_current = 0;
        self.pending_question = Some(question.text.clone());
        Some(question)
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }
}
