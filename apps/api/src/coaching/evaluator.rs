//! Coach evaluator: per-turn feedback and the end-of-interview summary.
//!
//! Both operations always produce a value: chain failures fall back to a
//! neutral record or a minimal summary built from what is already known,
//! and a failed search for one topic only empties that topic's resources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::coaching::resources::curate;
use crate::coaching::search::{SearchError, SearchFilters, SearchProvider};
use crate::events::{Event, EventBus, EventType};
use crate::llm_client::{ChainOutcome, ChainOutput, ChainTemplate, LlmGateway};
use crate::models::feedback::{FeedbackRecord, FinalSummary, Resource};
use crate::models::session::{AgentKind, ResponseType, Role, SessionConfig, Turn, TurnContent};

const SOURCE: &str = "coach";
const NEUTRAL_SCORE: u8 = 5;
const MAX_SCORE: u8 = 10;
const MAX_SEARCH_TOPICS: usize = 5;
const MAX_FALLBACK_ITEMS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
struct TurnEvaluation {
    score: u8,
    feedback: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
}

impl ChainOutput for TurnEvaluation {
    fn validate(&self) -> Result<(), String> {
        if self.score > MAX_SCORE {
            return Err(format!("score {} is outside 0..={MAX_SCORE}", self.score));
        }
        if self.feedback.trim().is_empty() {
            return Err("feedback is empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryAnalysis {
    patterns_tendencies: String,
    strengths: String,
    weaknesses: String,
    #[serde(default)]
    improvement_focus_areas: Vec<String>,
    #[serde(default)]
    resource_search_topics: Vec<String>,
}

impl ChainOutput for SummaryAnalysis {
    fn validate(&self) -> Result<(), String> {
        if self.patterns_tendencies.trim().is_empty() {
            return Err("patterns_tendencies is empty".to_string());
        }
        Ok(())
    }
}

/// Neutral record used when an evaluation fails or never finishes.
pub fn neutral_feedback(turn_index: usize, question: &str, answer: &str) -> FeedbackRecord {
    FeedbackRecord {
        turn_index,
        question: question.to_string(),
        answer: answer.to_string(),
        score: NEUTRAL_SCORE,
        feedback: "Detailed feedback is not available for this answer. \
                   Aim for a clear structure: context, your actions, and a measurable result."
            .to_string(),
        strengths: Vec::new(),
        improvements: Vec::new(),
        is_fallback: true,
    }
}

/// Coach turn carrying the most recent completed feedback, if any.
pub fn feedback_turn(latest: Option<FeedbackRecord>) -> Turn {
    match latest {
        Some(record) => Turn::coach(TurnContent::Feedback(record), ResponseType::Feedback),
        None => Turn::coach(
            TurnContent::Text(
                "No feedback is ready yet. Answer a question and check back shortly.".to_string(),
            ),
            ResponseType::Notice,
        ),
    }
}

pub struct CoachEvaluator {
    gateway: Arc<LlmGateway>,
    search: Arc<dyn SearchProvider>,
    events: Arc<EventBus>,
    search_timeout: Duration,
    resources_per_topic: usize,
}

impl CoachEvaluator {
    pub fn new(
        gateway: Arc<LlmGateway>,
        search: Arc<dyn SearchProvider>,
        events: Arc<EventBus>,
        search_timeout: Duration,
        resources_per_topic: usize,
    ) -> Self {
        Self {
            gateway,
            search,
            events,
            search_timeout,
            resources_per_topic,
        }
    }

    pub async fn evaluate_turn(
        &self,
        turn_index: usize,
        question: &str,
        answer: &str,
        job: &SessionConfig,
    ) -> FeedbackRecord {
        let inputs = json!({
            "job_role": job.job_role,
            "difficulty": job.difficulty.as_str(),
            "job_description": job.job_description.as_deref().unwrap_or("(not provided)"),
            "question": question,
            "answer": answer,
        });

        let outcome = self
            .gateway
            .invoke(ChainTemplate::TurnFeedback, inputs, || TurnEvaluation {
                score: NEUTRAL_SCORE,
                feedback: String::new(),
                strengths: Vec::new(),
                improvements: Vec::new(),
            })
            .await;

        match outcome {
            ChainOutcome::Success(eval) => FeedbackRecord {
                turn_index,
                question: question.to_string(),
                answer: answer.to_string(),
                score: eval.score,
                feedback: eval.feedback.trim().to_string(),
                strengths: clean_list(eval.strengths),
                improvements: clean_list(eval.improvements),
                is_fallback: false,
            },
            ChainOutcome::Fallback { reason, .. } => {
                debug!(turn_index, "Turn evaluation fell back: {reason}");
                neutral_feedback(turn_index, question, answer)
            }
        }
    }

    pub async fn generate_final_summary(
        &self,
        history: &[Turn],
        feedback: &[FeedbackRecord],
        job: &SessionConfig,
    ) -> FinalSummary {
        let inputs = json!({
            "job_role": job.job_role,
            "company_name": job.company().unwrap_or("(not specified)"),
            "transcript": transcript(history),
            "feedback": feedback_digest(feedback),
        });

        let analysis = match self
            .gateway
            .invoke(ChainTemplate::FinalSummary, inputs, || {
                minimal_analysis(feedback)
            })
            .await
        {
            ChainOutcome::Success(analysis) => analysis,
            ChainOutcome::Fallback { value, reason } => {
                info!("Final summary chain fell back to minimal summary: {reason}");
                value
            }
        };

        let focus_areas = dedupe(clean_list(analysis.improvement_focus_areas));
        let requested_topics = dedupe(clean_list(analysis.resource_search_topics));
        let mut topics = if requested_topics.is_empty() {
            focus_areas.clone()
        } else {
            requested_topics
        };
        topics.truncate(MAX_SEARCH_TOPICS);

        let recommended_resources = self.find_resources(&topics, job).await;

        FinalSummary {
            patterns_tendencies: analysis.patterns_tendencies.trim().to_string(),
            strengths: analysis.strengths.trim().to_string(),
            weaknesses: analysis.weaknesses.trim().to_string(),
            improvement_focus_areas: focus_areas,
            resource_search_topics: topics,
            recommended_resources,
        }
    }

    async fn find_resources(&self, topics: &[String], job: &SessionConfig) -> Vec<Resource> {
        let filters = SearchFilters {
            context: Some(job.job_role.trim().to_string()),
            ..SearchFilters::default()
        };

        let searches = topics.iter().map(|topic| {
            let filters = &filters;
            async move {
                let result =
                    match tokio::time::timeout(self.search_timeout, self.search.find(topic, filters))
                        .await
                    {
                        Ok(r) => r,
                        Err(_) => Err(SearchError::Timeout(self.search_timeout)),
                    };
                match result {
                    Ok(raw) => curate(topic, raw, self.resources_per_topic, filters.exclude_paid),
                    Err(e) => {
                        warn!(topic = %topic, "Resource search failed: {e}");
                        self.events.publish(Event::new(
                            EventType::Error,
                            SOURCE,
                            json!({ "topic": topic, "reason": e.to_string() }),
                        ));
                        Vec::new()
                    }
                }
            }
        });

        join_all(searches).await.into_iter().flatten().collect()
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|o| o.eq_ignore_ascii_case(&item)) {
            out.push(item);
        }
    }
    out
}

/// Most frequent entries first; ties keep first-seen order.
fn most_common(items: impl Iterator<Item = String>, n: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (order, item) in items.enumerate() {
        let key = item.trim().to_string();
        if key.is_empty() {
            continue;
        }
        counts.entry(key).or_insert((0, order)).0 += 1;
    }
    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(n).map(|(k, _)| k).collect()
}

fn minimal_analysis(feedback: &[FeedbackRecord]) -> SummaryAnalysis {
    let evaluated: Vec<&FeedbackRecord> = feedback.iter().filter(|f| !f.is_fallback).collect();
    let patterns_tendencies = if evaluated.is_empty() {
        "There was not enough evaluated material to identify clear patterns in this interview."
            .to_string()
    } else {
        let avg = evaluated.iter().map(|f| f.score as f32).sum::<f32>() / evaluated.len() as f32;
        format!(
            "Across {} evaluated answers the average score was {avg:.1}/10.",
            evaluated.len()
        )
    };

    let strengths = most_common(
        evaluated.iter().flat_map(|f| f.strengths.iter().cloned()),
        MAX_FALLBACK_ITEMS,
    );
    let improvements = most_common(
        evaluated.iter().flat_map(|f| f.improvements.iter().cloned()),
        MAX_FALLBACK_ITEMS,
    );

    SummaryAnalysis {
        patterns_tendencies,
        strengths: join_or(&strengths, "Not enough evidence to identify strengths yet."),
        weaknesses: join_or(&improvements, "Not enough evidence to identify weaknesses yet."),
        improvement_focus_areas: improvements,
        resource_search_topics: Vec::new(),
    }
}

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join("; ")
    }
}

fn transcript(history: &[Turn]) -> String {
    history
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

fn feedback_digest(feedback: &[FeedbackRecord]) -> String {
    if feedback.is_empty() {
        return "(none)".to_string();
    }
    feedback
        .iter()
        .map(|f| format!("- [{}/10] {}: {}", f.score, f.question, f.feedback))
        .collect::<Vec<_>>()
        .join("\n")
}
