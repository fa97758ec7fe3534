//! Session orchestration.
//!
//! The manager owns every `Session` and is the only caller of the two
//! agents. Calls for one session are serialized on that session's lock;
//! different sessions never contend beyond a short map lookup. Coach
//! evaluations run as spawned tasks and are joined, with a bound, only at
//! `end_interview`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coaching::evaluator::{neutral_feedback, CoachEvaluator};
use crate::coaching::search::SearchProvider;
use crate::config::OrchestratorSettings;
use crate::errors::AppError;
use crate::events::{Event, EventBus, EventType};
use crate::interview::interviewer::{AnsweredQuestion, InterviewerAgent};
use crate::interview::question_bank::QuestionBank;
use crate::llm_client::LlmGateway;
use crate::models::session::{AgentKind, SessionConfig, Turn};
use crate::session::agents::Agent;
use crate::session::models::{
    FeedbackLog, InterviewResult, PendingEvaluation, Session, StatsRecord,
};

const SOURCE: &str = "session_manager";

#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session_id: Uuid,
    pub intro: Turn,
}

type SessionHandle = Arc<Mutex<Session>>;

pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    interviewer: InterviewerAgent,
    coach: Arc<CoachEvaluator>,
    events: Arc<EventBus>,
    coach_join_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        gateway: Arc<LlmGateway>,
        search: Arc<dyn SearchProvider>,
        events: Arc<EventBus>,
        settings: &OrchestratorSettings,
    ) -> Self {
        let question_bank = QuestionBank::new(Arc::clone(&gateway), settings.max_generated_questions);
        let interviewer = InterviewerAgent::new(
            Arc::clone(&gateway),
            question_bank,
            Arc::clone(&events),
            settings.max_follow_ups_per_question,
        );
        let coach = Arc::new(CoachEvaluator::new(
            gateway,
            search,
            Arc::clone(&events),
            settings.search_timeout,
            settings.resources_per_topic,
        ));

        Self {
            sessions: RwLock::new(HashMap::new()),
            interviewer,
            coach,
            events,
            coach_join_timeout: settings.coach_join_timeout,
        }
    }

    /// Validates `config`, builds the question bank and returns the welcome turn.
    pub async fn start(&self, config: SessionConfig) -> Result<StartedSession, AppError> {
        config.validate()?;

        let started = Instant::now();
        let mut session = Session::new(config);
        self.interviewer.initialize(&mut session).await;
        let elapsed = started.elapsed();
        let intro = self
            .interviewer
            .introduce(&mut session)
            .with_processing_time(elapsed);
        session.append(intro.clone());
        session.counters.record_response(elapsed);

        let session_id = session.id;
        self.events.publish(Event::new(
            EventType::SessionStart,
            SOURCE,
            json!({
                "session_id": session_id,
                "job_role": session.config.job_role,
                "target_question_count": session.config.target_question_count,
                "question_bank_size": session.state.question_bank.len(),
            }),
        ));
        info!(%session_id, job_role = %session.config.job_role, "Session started");

        self.sessions
            .write()
            .await
            .insert(session_id, Arc::new(Mutex::new(session)));

        Ok(StartedSession { session_id, intro })
    }

    /// Handles one candidate message and returns the interviewer's reply.
    ///
    /// Once the interview is COMPLETED the stored closing turn is returned
    /// and the history is left untouched.
    pub async fn send_message(&self, session_id: Uuid, text: &str) -> Result<Turn, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("message text must not be empty".to_string()));
        }

        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;

        if session.state.is_completed() {
            debug!(%session_id, "Message received after completion; returning closing turn");
            return Ok(self.interviewer.complete(&mut session));
        }

        let started = Instant::now();
        let turn_index = session.append(Turn::user(text));
        session.counters.user_messages += 1;
        self.events.publish(Event::new(
            EventType::UserMessage,
            SOURCE,
            json!({
                "session_id": session_id,
                "turn_index": turn_index,
                "length": text.chars().count(),
            }),
        ));

        let reply = self.interviewer.process(&mut session).await;
        let elapsed = started.elapsed();
        let turn = reply.turn.with_processing_time(elapsed);
        session.append(turn.clone());
        session.counters.record_response(elapsed);

        self.events.publish(Event::new(
            EventType::AgentResponse,
            SOURCE,
            json!({
                "session_id": session_id,
                "agent": AgentKind::Interviewer.as_str(),
                "response_type": turn.response_type,
                "action": reply.action.map(|a| a.as_str()),
                "phase": session.state.phase,
                "processing_time_ms": turn.processing_time_ms,
            }),
        ));

        if let Some(answered) = reply.answered {
            self.schedule_evaluation(&mut session, turn_index, answered);
        }

        Ok(turn)
    }

    /// Finishes the interview and returns the summary plus one feedback
    /// record per answered turn. Repeated calls return the first result.
    ///
    /// The session lock is only held to close the interview and to stamp
    /// `ended_at`; joining evaluations and building the summary run without it.
    pub async fn end_interview(&self, session_id: Uuid) -> Result<InterviewResult, AppError> {
        let handle = self.handle(session_id).await?;
        let cell = Arc::clone(&handle.lock().await.result);
        let result = cell
            .get_or_init(|| self.finish(session_id, &handle))
            .await;
        Ok(result.clone())
    }

    async fn finish(&self, session_id: Uuid, handle: &SessionHandle) -> InterviewResult {
        let (pending, history, log, config) = {
            let mut session = handle.lock().await;
            if !session.state.is_completed() {
                let closing = self.interviewer.complete(&mut session);
                session.append(closing);
                session.counters.assistant_messages += 1;
            }
            (
                std::mem::take(&mut session.pending),
                session.history().to_vec(),
                Arc::clone(&session.feedback_log),
                Arc::clone(&session.config),
            )
        };

        self.join_evaluations(session_id, pending, &log).await;

        let per_turn_feedback = log.snapshot();
        let final_summary = self
            .coach
            .generate_final_summary(&history, &per_turn_feedback, &config)
            .await;

        let result = InterviewResult {
            session_id,
            final_summary,
            per_turn_feedback,
        };

        let mut session = handle.lock().await;
        session.ended_at = Some(Utc::now());
        let stats = session.stats();
        drop(session);

        self.events.publish(Event::new(
            EventType::SessionEnd,
            SOURCE,
            json!({
                "session_id": session_id,
                "answered_turns": stats.answered_turns,
                "feedback_fallbacks": stats.feedback_fallbacks,
                "elapsed_seconds": stats.elapsed_seconds,
            }),
        ));
        info!(
            %session_id,
            answered = stats.answered_turns,
            fallbacks = stats.feedback_fallbacks,
            "Session ended"
        );

        result
    }

    pub async fn get_history(&self, session_id: Uuid) -> Result<Vec<Turn>, AppError> {
        let handle = self.handle(session_id).await?;
        let session = handle.lock().await;
        Ok(session.history().to_vec())
    }

    pub async fn get_stats(&self, session_id: Uuid) -> Result<StatsRecord, AppError> {
        let handle = self.handle(session_id).await?;
        let session = handle.lock().await;
        Ok(session.stats())
    }

    /// Asks a named agent for its next turn without a new candidate message.
    /// Ended sessions are archived: the turn is returned but not recorded.
    pub async fn request_agent(&self, session_id: Uuid, agent: &str) -> Result<Turn, AppError> {
        let kind: AgentKind = agent.parse()?;
        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;

        if kind == AgentKind::Interviewer && session.state.is_completed() {
            return Ok(self.interviewer.complete(&mut session));
        }

        let agent = self.agent(kind);
        let started = Instant::now();
        let turn = agent.process(&mut session).await;
        let elapsed = started.elapsed();
        let turn = turn.with_processing_time(elapsed);
        if session.result.initialized() {
            return Ok(turn);
        }
        session.append(turn.clone());
        session.counters.record_response(elapsed);

        self.events.publish(Event::new(
            EventType::AgentResponse,
            SOURCE,
            json!({
                "session_id": session_id,
                "agent": agent.kind().as_str(),
                "response_type": turn.response_type,
                "phase": session.state.phase,
                "processing_time_ms": turn.processing_time_ms,
            }),
        ));

        Ok(turn)
    }

    fn agent(&self, kind: AgentKind) -> Agent<'_> {
        match kind {
            AgentKind::Interviewer => Agent::Interviewer(&self.interviewer),
            AgentKind::Coach => Agent::Coach,
        }
    }

    async fn handle(&self, session_id: Uuid) -> Result<SessionHandle, AppError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(AppError::SessionNotFound(session_id))
    }

    fn schedule_evaluation(
        &self,
        session: &mut Session,
        turn_index: usize,
        answered: AnsweredQuestion,
    ) {
        let coach = Arc::clone(&self.coach);
        let events = Arc::clone(&self.events);
        let log = Arc::clone(&session.feedback_log);
        let config = Arc::clone(&session.config);
        let session_id = session.id;
        let question = answered.question.clone();
        let answer = answered.answer.clone();

        let handle = tokio::spawn(async move {
            let record = coach
                .evaluate_turn(turn_index, &question, &answer, &config)
                .await;
            let (score, is_fallback) = (record.score, record.is_fallback);
            if log.record(record) {
                events.publish(Event::new(
                    EventType::CoachFeedback,
                    "coach",
                    json!({
                        "session_id": session_id,
                        "turn_index": turn_index,
                        "score": score,
                        "is_fallback": is_fallback,
                    }),
                ));
            }
        });

        session.answered_turns += 1;
        session.pending.push(PendingEvaluation {
            turn_index,
            question: answered.question,
            answer: answered.answer,
            handle,
        });
    }

    /// Waits for outstanding evaluations until the join deadline, aborts
    /// the rest, and fills every missing record with the neutral default.
    async fn join_evaluations(
        &self,
        session_id: Uuid,
        pending: Vec<PendingEvaluation>,
        log: &FeedbackLog,
    ) {
        let deadline = tokio::time::Instant::now() + self.coach_join_timeout;
        let mut timed_out = 0usize;

        for mut evaluation in pending {
            match tokio::time::timeout_at(deadline, &mut evaluation.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        %session_id,
                        turn_index = evaluation.turn_index,
                        "Coach evaluation task failed: {e}"
                    );
                }
                Err(_) => {
                    evaluation.handle.abort();
                    timed_out += 1;
                }
            }

            if !log.contains(evaluation.turn_index) {
                log.record(neutral_feedback(
                    evaluation.turn_index,
                    &evaluation.question,
                    &evaluation.answer,
                ));
            }
        }

        if timed_out > 0 {
            warn!(
                %session_id,
                timed_out,
                bound_secs = self.coach_join_timeout.as_secs(),
                "Coach evaluations did not finish in time; using neutral feedback"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::search::NoopSearchProvider;
    use crate::llm_client::testing::{test_settings, FailingBackend, ScriptedBackend};
    use crate::llm_client::{ChainTemplate, LlmBackend};
    use crate::models::interview::Phase;
    use crate::models::session::{ResponseType, Role, TurnContent};

    fn manager(backend: Arc<dyn LlmBackend>) -> (Arc<SessionManager>, Arc<EventBus>) {
        let settings = test_settings();
        let events = Arc::new(EventBus::new(settings.event_history_capacity));
        let gateway = Arc::new(LlmGateway::new(backend, Arc::clone(&events), &settings));
        (
            Arc::new(SessionManager::new(
                gateway,
                Arc::new(NoopSearchProvider),
                Arc::clone(&events),
                &settings,
            )),
            events,
        )
    }

    fn scripted() -> Arc<ScriptedBackend> {
        let backend = Arc::new(ScriptedBackend::new());
        backend.always(
            ChainTemplate::NextAction,
            json!({ "action": "ask_new_question" }),
        );
        backend.always(
            ChainTemplate::TurnFeedback,
            json!({
                "score": 7,
                "feedback": "Good structure, add measurable results.",
                "strengths": ["Clear structure"],
                "improvements": ["Quantify impact"]
            }),
        );
        backend.always(
            ChainTemplate::FinalSummary,
            json!({
                "patterns_tendencies": "Consistently structured answers.",
                "strengths": "Clear structure",
                "weaknesses": "Few metrics",
                "improvement_focus_areas": ["Quantifying impact"]
            }),
        );
        backend
    }

    async fn phase(manager: &SessionManager, id: Uuid) -> Phase {
        manager.get_stats(id).await.unwrap().phase
    }

    async fn session_count(manager: &SessionManager) -> usize {
        manager.sessions.read().await.len()
    }

    fn backend_engineer(target: u32) -> SessionConfig {
        SessionConfig::new("Backend Engineer", target)
    }

    #[tokio::test]
    async fn test_scenario_three_questions_end_to_end() {
        let (manager, events) = manager(scripted());

        let started = manager.start(backend_engineer(3)).await.unwrap();
        assert!(started.intro.text().unwrap().contains("Backend Engineer"));
        assert_eq!(started.intro.response_type, ResponseType::Introduction);
        let id = started.session_id;

        for _ in 0..3 {
            let turn = manager.send_message(id, "ready").await.unwrap();
            assert_eq!(turn.response_type, ResponseType::Question);
            assert!(turn.processing_time_ms.is_some());
        }
        let closing = manager.send_message(id, "my last answer").await.unwrap();
        assert_eq!(closing.response_type, ResponseType::Closing);
        assert_eq!(phase(&manager, id).await, Phase::Completed);

        let stats = manager.get_stats(id).await.unwrap();
        assert_eq!(stats.questions_asked, 3);
        assert_eq!(stats.user_messages, 4);
        assert_eq!(stats.assistant_messages, 5);
        assert_eq!(stats.answered_turns, 3);

        let result = manager.end_interview(id).await.unwrap();
        assert_eq!(result.per_turn_feedback.len(), 3);
        let indices: Vec<usize> = result.per_turn_feedback.iter().map(|f| f.turn_index).collect();
        assert_eq!(indices, vec![3, 5, 7]);
        assert!(result.per_turn_feedback.iter().all(|f| !f.is_fallback));
        assert_eq!(
            result.final_summary.improvement_focus_areas,
            vec!["Quantifying impact"]
        );

        assert_eq!(events.history(Some(EventType::SessionStart), 10).len(), 1);
        assert_eq!(events.history(Some(EventType::UserMessage), 10).len(), 4);
        assert_eq!(events.history(Some(EventType::CoachFeedback), 10).len(), 3);
        assert_eq!(events.history(Some(EventType::SessionEnd), 10).len(), 1);
    }

    #[tokio::test]
    async fn test_completed_session_returns_identical_closing_turn() {
        let (manager, _) = manager(scripted());
        let id = manager.start(backend_engineer(1)).await.unwrap().session_id;
        manager.send_message(id, "hello").await.unwrap();
        let closing = manager.send_message(id, "answer").await.unwrap();
        let history_len = manager.get_history(id).await.unwrap().len();

        for _ in 0..3 {
            assert_eq!(manager.send_message(id, "anything else?").await.unwrap(), closing);
        }
        assert_eq!(manager.get_history(id).await.unwrap().len(), history_len);
        assert_eq!(manager.get_stats(id).await.unwrap().questions_asked, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_coach_is_bounded_and_feedback_length_matches_answers() {
        let backend = scripted();
        backend.delay(ChainTemplate::TurnFeedback, Duration::from_secs(3600));
        let (manager, _) = manager(backend);

        let id = manager.start(backend_engineer(3)).await.unwrap().session_id;
        manager.send_message(id, "hi").await.unwrap();
        manager.send_message(id, "first answer").await.unwrap();
        manager.send_message(id, "second answer").await.unwrap();

        let result = manager.end_interview(id).await.unwrap();
        assert_eq!(result.per_turn_feedback.len(), 2);
        assert!(result.per_turn_feedback.iter().all(|f| f.is_fallback));
        assert_eq!(result.per_turn_feedback[0].answer, "first answer");

        let stats = manager.get_stats(id).await.unwrap();
        assert_eq!(stats.phase, Phase::Completed);
        assert_eq!(stats.feedback_fallbacks, 2);
        assert_eq!(stats.feedback_completed, 0);
        assert!(stats.ended_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_feedback_survives_join_timeout() {
        let backend = scripted();
        backend.delay_when(
            ChainTemplate::TurnFeedback,
            "answer",
            json!("slow"),
            Duration::from_secs(3600),
        );
        let (manager, _) = manager(backend);

        let id = manager.start(backend_engineer(3)).await.unwrap().session_id;
        manager.send_message(id, "hi").await.unwrap();
        manager.send_message(id, "fast").await.unwrap();
        manager.send_message(id, "slow").await.unwrap();

        let result = manager.end_interview(id).await.unwrap();
        let feedback: Vec<(&str, bool, u8)> = result
            .per_turn_feedback
            .iter()
            .map(|f| (f.answer.as_str(), f.is_fallback, f.score))
            .collect();
        assert_eq!(feedback, vec![("fast", false, 7), ("slow", true, 5)]);

        let stats = manager.get_stats(id).await.unwrap();
        assert_eq!(stats.feedback_completed, 1);
        assert_eq!(stats.feedback_fallbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_are_not_blocked_while_summary_runs() {
        let backend = scripted();
        backend.delay(ChainTemplate::FinalSummary, Duration::from_secs(3));
        let (manager, _) = manager(backend);

        let id = manager.start(backend_engineer(2)).await.unwrap().session_id;
        manager.send_message(id, "hi").await.unwrap();
        manager.send_message(id, "an answer").await.unwrap();

        let ending = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.end_interview(id).await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;

        let started = tokio::time::Instant::now();
        let history = manager.get_history(id).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(history.last().unwrap().response_type, ResponseType::Closing);
        assert!(manager.get_stats(id).await.unwrap().ended_at.is_none());

        let result = ending.await.unwrap().unwrap();
        assert_eq!(result.per_turn_feedback.len(), 1);
        assert!(manager.get_stats(id).await.unwrap().ended_at.is_some());
    }

    #[tokio::test]
    async fn test_end_interview_is_idempotent_and_closes_history() {
        let (manager, events) = manager(scripted());
        let id = manager.start(backend_engineer(3)).await.unwrap().session_id;
        manager.send_message(id, "hi").await.unwrap();
        manager.send_message(id, "an answer").await.unwrap();

        let first = manager.end_interview(id).await.unwrap();
        let second = manager.end_interview(id).await.unwrap();
        assert_eq!(first.final_summary, second.final_summary);
        assert_eq!(first.per_turn_feedback, second.per_turn_feedback);
        assert_eq!(events.history(Some(EventType::SessionEnd), 10).len(), 1);

        let history = manager.get_history(id).await.unwrap();
        assert_eq!(history.last().unwrap().response_type, ResponseType::Closing);
        assert_eq!(phase(&manager, id).await, Phase::Completed);
    }

    #[tokio::test]
    async fn test_everything_failing_still_completes() {
        let (manager, events) = manager(Arc::new(FailingBackend::new()));
        let id = manager.start(backend_engineer(2)).await.unwrap().session_id;
        manager.send_message(id, "hi").await.unwrap();
        manager.send_message(id, "answer one").await.unwrap();
        manager.send_message(id, "answer two").await.unwrap();

        let result = manager.end_interview(id).await.unwrap();
        assert_eq!(result.per_turn_feedback.len(), 2);
        assert!(!result.final_summary.patterns_tendencies.is_empty());
        assert!(!events.history(Some(EventType::Error), 100).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_creates_no_session() {
        let (manager, _) = manager(scripted());
        let err = manager.start(backend_engineer(0)).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(session_count(&manager).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_reported() {
        let (manager, _) = manager(scripted());
        let missing = Uuid::new_v4();
        assert!(matches!(
            manager.send_message(missing, "hi").await,
            Err(AppError::SessionNotFound(id)) if id == missing
        ));
        assert!(matches!(
            manager.get_history(missing).await,
            Err(AppError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.end_interview(missing).await,
            Err(AppError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (manager, _) = manager(scripted());
        let id = manager.start(backend_engineer(2)).await.unwrap().session_id;
        assert!(matches!(
            manager.send_message(id, "   ").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(manager.get_history(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_agent_dispatch() {
        let (manager, _) = manager(scripted());
        let id = manager.start(backend_engineer(3)).await.unwrap().session_id;

        assert!(matches!(
            manager.request_agent(id, "recruiter").await,
            Err(AppError::AgentNotFound(name)) if name == "recruiter"
        ));

        let notice = manager.request_agent(id, "coach").await.unwrap();
        assert_eq!(notice.response_type, ResponseType::Notice);

        let question = manager.request_agent(id, "interviewer").await.unwrap();
        assert_eq!(question.response_type, ResponseType::Question);
        let repeated = manager.request_agent(id, "Interviewer").await.unwrap();
        assert_eq!(repeated.text(), question.text());
        assert_eq!(manager.get_stats(id).await.unwrap().questions_asked, 1);

        manager.send_message(id, "my answer").await.unwrap();
        manager.end_interview(id).await.unwrap();
        let archived_len = manager.get_history(id).await.unwrap().len();
        let feedback = manager.request_agent(id, "coach").await.unwrap();
        assert_eq!(feedback.response_type, ResponseType::Feedback);
        assert!(matches!(feedback.content, TurnContent::Feedback(ref f) if f.score == 7));
        assert_eq!(manager.get_history(id).await.unwrap().len(), archived_len);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_session_messages_are_serialized() {
        let (manager, _) = manager(scripted());
        let id = manager.start(backend_engineer(10)).await.unwrap().session_id;

        let sends = (0..6).map(|i| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.send_message(id, &format!("message {i}")).await })
        });
        for result in futures::future::join_all(sends).await {
            result.unwrap().unwrap();
        }

        let history = manager.get_history(id).await.unwrap();
        assert_eq!(history.len(), 13);
        for pair in history[1..].chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sessions_progress_independently() {
        let (manager, _) = manager(scripted());
        let a = manager.start(backend_engineer(2)).await.unwrap().session_id;
        let b = manager.start(backend_engineer(2)).await.unwrap().session_id;
        assert_ne!(a, b);

        let (ra, rb) = tokio::join!(
            manager.send_message(a, "hello from a"),
            manager.send_message(b, "hello from b")
        );
        assert_eq!(ra.unwrap().response_type, ResponseType::Question);
        assert_eq!(rb.unwrap().response_type, ResponseType::Question);

        manager.end_interview(a).await.unwrap();
        assert_eq!(phase(&manager, a).await, Phase::Completed);
        assert_eq!(phase(&manager, b).await, Phase::Questioning);
        assert_eq!(session_count(&manager).await, 2);
    }
}
