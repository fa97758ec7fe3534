//! LLM Gateway: the one seam where backend unreliability is absorbed.
//!
//! Every chain call is retried with exponential backoff, bounded by a
//! timeout, and validated against its output type. When attempts run out
//! the caller's default is returned as `ChainOutcome::Fallback` and an
//! `ERROR` event is published. Nothing here returns an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::OrchestratorSettings;
use crate::events::{Event, EventBus, EventType};
use crate::llm_client::{ChainTemplate, LlmBackend, LlmError};

const SOURCE: &str = "llm_gateway";

/// Structured chain output. `validate` rejects payloads that parse but are
/// unusable (empty text, out-of-range scores, ...).
pub trait ChainOutput: DeserializeOwned + Send {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Result of a chain call. Both variants carry a usable value.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome<T> {
    Success(T),
    Fallback { value: T, reason: String },
}

#[allow(dead_code)]
impl<T> ChainOutcome<T> {
    pub fn into_value(self) -> T {
        match self {
            ChainOutcome::Success(v) => v,
            ChainOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ChainOutcome::Fallback { .. })
    }
}

pub struct LlmGateway {
    backend: Arc<dyn LlmBackend>,
    events: Arc<EventBus>,
    max_attempts: u32,
    timeout: Duration,
    backoff: Duration,
}

impl LlmGateway {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        events: Arc<EventBus>,
        settings: &OrchestratorSettings,
    ) -> Self {
        Self {
            backend,
            events,
            max_attempts: settings.llm_max_attempts.max(1),
            timeout: settings.llm_timeout,
            backoff: settings.llm_backoff,
        }
    }

    pub async fn invoke<T, F>(
        &self,
        template: ChainTemplate,
        inputs: Value,
        default: F,
    ) -> ChainOutcome<T>
    where
        T: ChainOutput,
        F: FnOnce() -> T,
    {
        let template_id = template.id();
        let mut last_error: Option<LlmError> = None;
        let mut attempts = 0;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.backoff, attempt);
                warn!(
                    "Chain '{}' attempt {} failed, retrying after {}ms...",
                    template_id,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            let result = match tokio::time::timeout(
                self.timeout,
                self.backend.invoke(template_id, &inputs),
            )
            .await
            {
                Ok(r) => r.and_then(decode::<T>),
                Err(_) => Err(LlmError::Timeout(self.timeout)),
            };

            match result {
                Ok(value) => {
                    debug!(template = template_id, attempts, "Chain succeeded");
                    return ChainOutcome::Success(value);
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    warn!(template = template_id, attempt = attempt + 1, "Chain failed: {e}");
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());

        self.events.publish(Event::new(
            EventType::Error,
            SOURCE,
            json!({
                "template_id": template_id,
                "reason": reason,
                "attempts": attempts,
            }),
        ));

        ChainOutcome::Fallback {
            value: default(),
            reason,
        }
    }
}

/// Exponential backoff before retry `attempt` (1-based): base, 2×base, 4×base, ...
/// Saturates instead of overflowing on large bases.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

fn decode<T: ChainOutput>(raw: Value) -> Result<T, LlmError> {
    let value: T = serde_json::from_value(raw)?;
    value.validate().map_err(LlmError::Validation)?;
    Ok(value)
}
