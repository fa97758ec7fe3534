use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::feedback::FeedbackRecord;

/// Upper bound on questions per session; keeps prompts and banks bounded.
pub const MAX_QUESTION_COUNT: u32 = 50;
const DEFAULT_QUESTION_COUNT: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStyle {
    #[default]
    Formal,
    Casual,
    Technical,
    Behavioral,
}

impl InterviewStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStyle::Formal => "formal",
            InterviewStyle::Casual => "casual",
            InterviewStyle::Technical => "technical",
            InterviewStyle::Behavioral => "behavioral",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

fn default_question_count() -> u32 {
    DEFAULT_QUESTION_COUNT
}

/// Caller-supplied interview parameters. Immutable once a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub job_role: String,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub resume_content: Option<String>,
    #[serde(default)]
    pub interview_style: InterviewStyle,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_question_count")]
    pub target_question_count: u32,
    #[serde(default)]
    pub company_name: Option<String>,
    /// Pacing hint for prompts only. The question count alone ends an interview.
    #[serde(default)]
    pub target_duration_minutes: Option<u32>,
}

impl SessionConfig {
    pub fn new(job_role: impl Into<String>, target_question_count: u32) -> Self {
        Self {
            job_role: job_role.into(),
            job_description: None,
            resume_content: None,
            interview_style: InterviewStyle::default(),
            difficulty: Difficulty::default(),
            target_question_count,
            company_name: None,
            target_duration_minutes: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.job_role.trim().is_empty() {
            return Err(AppError::Config("job_role is required".to_string()));
        }
        if self.target_question_count == 0 {
            return Err(AppError::Config(
                "target_question_count must be a positive integer".to_string(),
            ));
        }
        if self.target_question_count > MAX_QUESTION_COUNT {
            return Err(AppError::Config(format!(
                "target_question_count must not exceed {MAX_QUESTION_COUNT}"
            )));
        }
        Ok(())
    }

    /// Company name, if one was given and is not blank.
    pub fn company(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Interviewer,
    Coach,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Interviewer => "interviewer",
            AgentKind::Coach => "coach",
        }
    }
}

impl FromStr for AgentKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interviewer" => Ok(AgentKind::Interviewer),
            "coach" => Ok(AgentKind::Coach),
            _ => Err(AppError::AgentNotFound(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Answer,
    Introduction,
    Question,
    FollowUp,
    Closing,
    Feedback,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Feedback(FeedbackRecord),
}

impl TurnContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TurnContent::Text(t) => Some(t),
            TurnContent::Feedback(_) => None,
        }
    }
}

/// One message in a session. Never mutated once appended to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub agent: Option<AgentKind>,
    pub content: TurnContent,
    pub response_type: ResponseType,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: Option<u64>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            agent: None,
            content: TurnContent::Text(text.into()),
            response_type: ResponseType::Answer,
            timestamp: Utc::now(),
            processing_time_ms: None,
        }
    }

    pub fn interviewer(text: impl Into<String>, response_type: ResponseType) -> Self {
        Self {
            role: Role::Assistant,
            agent: Some(AgentKind::Interviewer),
            content: TurnContent::Text(text.into()),
            response_type,
            timestamp: Utc::now(),
            processing_time_ms: None,
        }
    }

    pub fn coach(content: TurnContent, response_type: ResponseType) -> Self {
        Self {
            role: Role::Assistant,
            agent: Some(AgentKind::Coach),
            content,
            response_type,
            timestamp: Utc::now(),
            processing_time_ms: None,
        }
    }

    pub fn with_processing_time(mut self, elapsed: std::time::Duration) -> Self {
        self.processing_time_ms = Some(elapsed.as_millis() as u64);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}
