//! Interviewer agent: drives the interview phase state machine.
//!
//! INITIALIZING → (question bank built) → INTRODUCING → (welcome) →
//! QUESTIONING → (end_interview) → COMPLETED. Phases never move backwards
//! and COMPLETED is terminal: every later input gets the same closing turn.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::events::{Event, EventBus, EventType};
use crate::interview::question_bank::QuestionBank;
use crate::llm_client::{ChainOutcome, ChainOutput, ChainTemplate, LlmGateway};
use crate::models::interview::{Phase, QuestionSource};
use crate::models::session::{AgentKind, ResponseType, Role, SessionConfig, Turn};
use crate::session::models::Session;

const SOURCE: &str = "interviewer";
/// Turns of history passed to the next-action chain.
const HISTORY_WINDOW: usize = 12;
const FOLLOW_UP_SNIPPET_WORDS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewAction {
    AskNewQuestion,
    AskFollowUp,
    EndInterview,
}

impl InterviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewAction::AskNewQuestion => "ask_new_question",
            InterviewAction::AskFollowUp => "ask_follow_up",
            InterviewAction::EndInterview => "end_interview",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextActionDecision {
    pub action: InterviewAction,
    #[serde(default)]
    pub acknowledgement: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl ChainOutput for NextActionDecision {}

impl NextActionDecision {
    fn fallback(action: InterviewAction) -> Self {
        Self {
            action,
            acknowledgement: None,
            reasoning: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FollowUpQuestion {
    follow_up: String,
}

impl ChainOutput for FollowUpQuestion {
    fn validate(&self) -> Result<(), String> {
        if self.follow_up.trim().is_empty() {
            return Err("follow_up is empty".to_string());
        }
        Ok(())
    }
}

/// The question/answer pair a user turn just completed.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone)]
pub struct InterviewerReply {
    pub turn: Turn,
    pub answered: Option<AnsweredQuestion>,
    pub action: Option<InterviewAction>,
}

impl InterviewerReply {
    fn plain(turn: Turn) -> Self {
        Self {
            turn,
            answered: None,
            action: None,
        }
    }
}

/// Default decision when the chain fails.
pub fn fallback_action(asked_count: usize, target: usize) -> InterviewAction {
    if asked_count < target {
        InterviewAction::AskNewQuestion
    } else {
        InterviewAction::EndInterview
    }
}

pub struct InterviewerAgent {
    gateway: Arc<LlmGateway>,
    question_bank: QuestionBank,
    events: Arc<EventBus>,
    max_follow_ups: u32,
}

impl InterviewerAgent {
    pub fn new(
        gateway: Arc<LlmGateway>,
        question_bank: QuestionBank,
        events: Arc<EventBus>,
        max_follow_ups: u32,
    ) -> Self {
        Self {
            gateway,
            question_bank,
            events,
            max_follow_ups,
        }
    }

    /// INITIALIZING → INTRODUCING. Builds the question bank. No-op in later phases.
    pub async fn initialize(&self, session: &mut Session) {
        if session.state.phase != Phase::Initializing {
            return;
        }
        let bank = self.question_bank.generate(&session.config).await;
        let generated = bank
            .iter()
            .filter(|q| q.source == QuestionSource::Generated)
            .count();
        info!(
            session_id = %session.id,
            questions = bank.len(),
            generated,
            "Question bank ready"
        );
        session.state.question_bank = bank;
        self.events.publish(Event::new(
            EventType::QuestionBankReady,
            SOURCE,
            json!({
                "session_id": session.id,
                "count": session.state.question_bank.len(),
                "generated": generated,
            }),
        ));
        self.advance(session);
    }

    /// INTRODUCING → QUESTIONING. Returns the welcome turn.
    pub fn introduce(&self, session: &mut Session) -> Turn {
        let turn = Turn::interviewer(welcome_message(&session.config), ResponseType::Introduction);
        if session.state.phase == Phase::Introducing {
            self.advance(session);
        }
        turn
    }

    /// Handles the latest user turn for whatever phase the session is in.
    pub async fn process(&self, session: &mut Session) -> InterviewerReply {
        match session.state.phase {
            Phase::Initializing => {
                self.initialize(session).await;
                InterviewerReply::plain(self.introduce(session))
            }
            Phase::Introducing => InterviewerReply::plain(self.introduce(session)),
            Phase::Questioning => self.respond(session).await,
            Phase::Completed => InterviewerReply::plain(self.complete(session)),
        }
    }

    /// Moves the session to COMPLETED (through any remaining phases) and
    /// returns the closing turn. Repeated calls return the identical turn.
    pub fn complete(&self, session: &mut Session) -> Turn {
        if let Some(turn) = &session.state.closing_turn {
            return turn.clone();
        }
        let turn = Turn::interviewer(closing_message(&session.config), ResponseType::Closing);
        session.state.closing_turn = Some(turn.clone());
        session.state.pending_question = None;
        while session.state.phase != Phase::Completed {
            self.advance(session);
        }
        turn
    }

    /// Turn for a direct request that carries no new answer. An unanswered
    /// question is repeated as-is; otherwise the state machine advances.
    pub async fn nudge(&self, session: &mut Session) -> Turn {
        if session.state.phase == Phase::Questioning {
            if let Some(question) = &session.state.pending_question {
                return Turn::interviewer(question.clone(), ResponseType::Question);
            }
        }
        self.process(session).await.turn
    }

    async fn respond(&self, session: &mut Session) -> InterviewerReply {
        let answer = session.last_user_text().unwrap_or_default().to_string();
        let answered = session
            .state
            .pending_question
            .take()
            .map(|question| AnsweredQuestion {
                question,
                answer: answer.clone(),
            });

        let decision = self
            .decide(session, answered.as_ref().map(|a| a.question.as_str()), &answer)
            .await;
        let action = sanitize_action(
            decision.action,
            session.state.asked_count,
            session.state.follow_ups_on_current,
            self.max_follow_ups,
            answered.is_some(),
        );
        debug!(
            session_id = %session.id,
            proposed = decision.action.as_str(),
            action = action.as_str(),
            reasoning = decision.reasoning.as_deref().unwrap_or(""),
            "Interviewer decision"
        );

        let acknowledgement = decision
            .acknowledgement
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        let turn = match action {
            InterviewAction::AskNewQuestion => match session.state.take_next_question() {
                Some(question) => Turn::interviewer(
                    with_acknowledgement(acknowledgement.as_deref(), &question.text),
                    ResponseType::Question,
                ),
                None => self.complete(session),
            },
            InterviewAction::AskFollowUp => {
                let previous = answered
                    .as_ref()
                    .map(|a| a.question.clone())
                    .unwrap_or_default();
                let follow_up = self.follow_up(&session.config, &previous, &answer).await;
                session.state.follow_ups_on_current += 1;
                session.state.follow_ups_asked += 1;
                session.state.pending_question = Some(follow_up.clone());
                Turn::interviewer(
                    with_acknowledgement(acknowledgement.as_deref(), &follow_up),
                    ResponseType::FollowUp,
                )
            }
            InterviewAction::EndInterview => self.complete(session),
        };

        InterviewerReply {
            turn,
            answered,
            action: Some(action),
        }
    }

    async fn decide(
        &self,
        session: &Session,
        current_question: Option<&str>,
        answer: &str,
    ) -> NextActionDecision {
        let asked = session.state.asked_count;
        let target = session.config.target_question_count as usize;

        if asked >= target {
            info!(session_id = %session.id, asked, target, "Question target reached; ending interview");
            return NextActionDecision::fallback(InterviewAction::EndInterview);
        }

        let inputs = json!({
            "job_role": session.config.job_role,
            "interview_style": session.config.interview_style.as_str(),
            "target_duration_minutes": session
                .config
                .target_duration_minutes
                .map(|m| m.to_string())
                .unwrap_or_else(|| "(unspecified)".to_string()),
            "history": transcript(session.history(), HISTORY_WINDOW),
            "last_answer": answer,
            "current_question": current_question.unwrap_or("(none yet)"),
            "asked_count": asked,
            "target_question_count": target,
            "follow_ups_on_current": session.state.follow_ups_on_current,
        });

        let default = fallback_action(asked, target);
        match self
            .gateway
            .invoke(ChainTemplate::NextAction, inputs, || {
                NextActionDecision::fallback(default)
            })
            .await
        {
            ChainOutcome::Success(decision) => decision,
            ChainOutcome::Fallback { value, reason } => {
                debug!(session_id = %session.id, "Next-action chain fell back: {reason}");
                value
            }
        }
    }

    async fn follow_up(&self, config: &SessionConfig, question: &str, answer: &str) -> String {
        let inputs = json!({
            "job_role": config.job_role,
            "interview_style": config.interview_style.as_str(),
            "question": question,
            "answer": answer,
        });
        let outcome = self
            .gateway
            .invoke(ChainTemplate::FollowUp, inputs, || FollowUpQuestion {
                follow_up: fallback_follow_up(answer),
            })
            .await;
        match outcome {
            ChainOutcome::Success(f) => f.follow_up.trim().to_string(),
            ChainOutcome::Fallback { value, .. } => value.follow_up,
        }
    }

    fn advance(&self, session: &mut Session) {
        let from = session.state.phase;
        if let Some(to) = session.state.advance() {
            info!(session_id = %session.id, ?from, ?to, "Interview phase changed");
            self.events.publish(Event::new(
                EventType::PhaseChanged,
                SOURCE,
                json!({ "session_id": session.id, "from": from, "to": to }),
            ));
        }
    }
}

/// Applies the hard rules on top of whatever the chain proposed.
fn sanitize_action(
    proposed: InterviewAction,
    asked_count: usize,
    follow_ups_on_current: u32,
    max_follow_ups: u32,
    has_answered_question: bool,
) -> InterviewAction {
    match proposed {
        // Nothing has been asked yet, so there is nothing to end or follow up on.
        _ if asked_count == 0 => InterviewAction::AskNewQuestion,
        InterviewAction::AskFollowUp
            if !has_answered_question || follow_ups_on_current >= max_follow_ups =>
        {
            InterviewAction::AskNewQuestion
        }
        other => other,
    }
}

fn with_acknowledgement(acknowledgement: Option<&str>, question: &str) -> String {
    match acknowledgement {
        Some(ack) => format!("{ack} {question}"),
        None => question.to_string(),
    }
}

fn welcome_message(config: &SessionConfig) -> String {
    let company = config
        .company()
        .map(|c| format!(" at {c}"))
        .unwrap_or_default();
    let count = config.target_question_count;
    let plural = if count == 1 { "" } else { "s" };
    format!(
        "Hello, and welcome to your interview for the {} position{company}. \
         I'll be your interviewer today, and we'll work through {count} question{plural}. \
         Take your time with each answer. Whenever you're ready, say hello and we'll begin.",
        config.job_role.trim()
    )
}

fn closing_message(config: &SessionConfig) -> String {
    let company = config
        .company()
        .map(|c| format!(" at {c}"))
        .unwrap_or_default();
    format!(
        "Thank you for your time today. That concludes our interview for the {} position{company}. \
         Your coach is now preparing a summary of how it went.",
        config.job_role.trim()
    )
}

fn fallback_follow_up(answer: &str) -> String {
    let words: Vec<&str> = answer.split_whitespace().collect();
    if words.is_empty() {
        return "Could you expand on your previous answer with a specific example?".to_string();
    }
    let mut snippet = words
        .iter()
        .take(FOLLOW_UP_SNIPPET_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > FOLLOW_UP_SNIPPET_WORDS {
        snippet.push_str("...");
    }
    format!("You mentioned \"{snippet}\". Could you expand on that with a specific example and its outcome?")
}

fn transcript(history: &[Turn], window: usize) -> String {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .filter_map(|turn| {
            let speaker = match (turn.role, turn.agent) {
                (Role::User, _) => "Candidate",
                (Role::Assistant, Some(AgentKind::Coach)) => return None,
                (Role::Assistant, _) => "Interviewer",
                (Role::System, _) => return None,
            };
            turn.text().map(|t| format!("{speaker}: {t}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
