//! Question bank: builds the fixed-size, ordered question list for a session.
//!
//! Priority order until `target_question_count` is reached:
//! 1. the fixed opening question
//! 2. up to K job-specific questions from the `job_questions` chain
//! 3. template questions, cycling through the session's pool
//!
//! A failed chain simply means step 3 fills more slots. `generate` never fails.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::interview::templates::{opening_question, template_pool};
use crate::llm_client::{ChainOutcome, ChainOutput, ChainTemplate, LlmGateway};
use crate::models::interview::{Question, QuestionSource};
use crate::models::session::SessionConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedQuestions {
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuestion {
    pub text: String,
    #[serde(default)]
    pub justification: Option<String>,
}

impl ChainOutput for GeneratedQuestions {
    fn validate(&self) -> Result<(), String> {
        if self.questions.iter().any(|q| q.text.trim().is_empty()) {
            return Err("generated question with empty text".to_string());
        }
        Ok(())
    }
}

pub struct QuestionBank {
    gateway: Arc<LlmGateway>,
    max_generated: usize,
}

impl QuestionBank {
    pub fn new(gateway: Arc<LlmGateway>, max_generated: usize) -> Self {
        Self {
            gateway,
            max_generated,
        }
    }

    pub async fn generate(&self, config: &SessionConfig) -> Vec<Question> {
        let target = config.target_question_count as usize;
        let mut bank: Vec<Question> = Vec::with_capacity(target);
        let mut seen: HashSet<String> = HashSet::new();

        if target == 0 {
            return bank;
        }

        let opening = opening_question(config);
        seen.insert(normalize(&opening));
        bank.push(Question::template(opening));

        let k = self.max_generated.min(target - 1);
        if k > 0 {
            for generated in self.job_specific(config, k).await {
                if bank.len() >= 1 + k {
                    break;
                }
                let text = generated.text.trim().to_string();
                if !seen.insert(normalize(&text)) {
                    debug!("Dropping duplicate generated question: {text}");
                    continue;
                }
                bank.push(Question {
                    text,
                    source: QuestionSource::Generated,
                    justification: generated
                        .justification
                        .map(|j| j.trim().to_string())
                        .filter(|j| !j.is_empty()),
                });
            }
        }

        fill_from_templates(&mut bank, &mut seen, &template_pool(config), target);
        bank
    }

    async fn job_specific(&self, config: &SessionConfig, k: usize) -> Vec<GeneratedQuestion> {
        let inputs = json!({
            "count": k,
            "job_role": config.job_role,
            "company_name": config.company().unwrap_or("(not specified)"),
            "job_description": config.job_description.as_deref().unwrap_or("(not provided)"),
            "resume_content": config.resume_content.as_deref().unwrap_or("(not provided)"),
            "interview_style": config.interview_style.as_str(),
            "difficulty": config.difficulty.as_str(),
        });

        match self
            .gateway
            .invoke(ChainTemplate::JobQuestions, inputs, GeneratedQuestions::default)
            .await
        {
            ChainOutcome::Success(generated) => generated.questions,
            ChainOutcome::Fallback { reason, .. } => {
                info!("Job-specific questions unavailable ({reason}); using templates only");
                Vec::new()
            }
        }
    }
}

/// Appends template questions until `bank` holds `target` entries. Once the
/// pool is exhausted it restarts with a round marker so text stays unique.
fn fill_from_templates(
    bank: &mut Vec<Question>,
    seen: &mut HashSet<String>,
    pool: &[String],
    target: usize,
) {
    if pool.is_empty() {
        return;
    }
    let mut round = 1;
    let mut index = 0;
    let mut last_base: Option<&str> = None;

    while bank.len() < target {
        if index == pool.len() {
            index = 0;
            round += 1;
        }
        let base = pool[index].as_str();
        index += 1;

        if last_base == Some(base) && pool.len() > 1 {
            continue;
        }
        let text = if round == 1 {
            base.to_string()
        } else {
            format!("{base} This time, please draw on a different example (round {round}).")
        };
        if !seen.insert(normalize(&text)) {
            continue;
        }
        last_base = Some(base);
        bank.push(Question::template(text));
    }
}

/// Lowercase, alphanumerics only, single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
