use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Resource search is disabled when no key is configured.
    pub tavily_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub settings: OrchestratorSettings,
}

/// Tunables for the orchestration engine. Injected into the gateway, both
/// agents, and the session manager; never read from globals.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Total attempts per chain call (first try included).
    pub llm_max_attempts: u32,
    pub llm_timeout: Duration,
    /// Base delay for exponential backoff between attempts.
    pub llm_backoff: Duration,
    pub search_timeout: Duration,
    /// Upper bound `end_interview` waits for in-flight coaching tasks.
    pub coach_join_timeout: Duration,
    pub event_history_capacity: usize,
    pub max_generated_questions: usize,
    pub resources_per_topic: usize,
    pub max_follow_ups_per_question: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            llm_max_attempts: 3,
            llm_timeout: Duration::from_secs(60),
            llm_backoff: Duration::from_millis(1000),
            search_timeout: Duration::from_secs(10),
            coach_join_timeout: Duration::from_secs(15),
            event_history_capacity: 1000,
            max_generated_questions: 3,
            resources_per_topic: 3,
            max_follow_ups_per_question: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = OrchestratorSettings::default();
        let settings = OrchestratorSettings {
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", defaults.llm_max_attempts)?.max(1),
            llm_timeout: Duration::from_secs(parse_env(
                "LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            llm_backoff: Duration::from_millis(parse_env(
                "LLM_BACKOFF_MS",
                defaults.llm_backoff.as_millis() as u64,
            )?),
            search_timeout: Duration::from_secs(parse_env(
                "SEARCH_TIMEOUT_SECS",
                defaults.search_timeout.as_secs(),
            )?),
            coach_join_timeout: Duration::from_secs(parse_env(
                "COACH_JOIN_TIMEOUT_SECS",
                defaults.coach_join_timeout.as_secs(),
            )?),
            event_history_capacity: parse_env(
                "EVENT_HISTORY_CAPACITY",
                defaults.event_history_capacity,
            )?,
            max_generated_questions: parse_env(
                "MAX_GENERATED_QUESTIONS",
                defaults.max_generated_questions,
            )?,
            resources_per_topic: parse_env("RESOURCES_PER_TOPIC", defaults.resources_per_topic)?,
            max_follow_ups_per_question: parse_env(
                "MAX_FOLLOW_UPS_PER_QUESTION",
                defaults.max_follow_ups_per_question,
            )?,
        };

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            tavily_api_key: std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            port: parse_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            settings,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
