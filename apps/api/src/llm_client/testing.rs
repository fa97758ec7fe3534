//! In-process LLM backends for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::OrchestratorSettings;
use crate::llm_client::{ChainTemplate, LlmBackend, LlmError};

/// Settings with millisecond backoff so retry paths stay fast.
pub fn test_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        llm_max_attempts: 3,
        llm_timeout: Duration::from_secs(5),
        llm_backoff: Duration::from_millis(1),
        search_timeout: Duration::from_secs(2),
        coach_join_timeout: Duration::from_secs(2),
        event_history_capacity: 500,
        max_generated_questions: 3,
        resources_per_topic: 3,
        max_follow_ups_per_question: 2,
    }
}

/// Replays queued responses per template; falls back to an `always`
/// response, then to an error.
#[derive(Default)]
pub struct ScriptedBackend {
    queued: Mutex<HashMap<String, VecDeque<Result<Value, LlmError>>>>,
    always: Mutex<HashMap<String, Value>>,
    delays: Mutex<HashMap<String, Duration>>,
    delays_when: Mutex<Vec<(String, String, Value, Duration)>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, template: ChainTemplate, response: Result<Value, LlmError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(template.id().to_string())
            .or_default()
            .push_back(response);
    }

    pub fn always(&self, template: ChainTemplate, response: Value) {
        self.always
            .lock()
            .unwrap()
            .insert(template.id().to_string(), response);
    }

    pub fn delay(&self, template: ChainTemplate, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(template.id().to_string(), delay);
    }

    /// Delays `template` only for calls whose input `key` equals `value`.
    pub fn delay_when(&self, template: ChainTemplate, key: &str, value: Value, delay: Duration) {
        self.delays_when.lock().unwrap().push((
            template.id().to_string(),
            key.to_string(),
            value,
            delay,
        ));
    }

    pub fn calls_for(&self, template: ChainTemplate) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == template.id())
            .count()
    }

    pub fn last_vars(&self, template: ChainTemplate) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == template.id())
            .map(|(_, vars)| vars.clone())
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, template_id: &str, vars: &Value) -> Result<Value, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((template_id.to_string(), vars.clone()));

        let delay = self
            .delays_when
            .lock()
            .unwrap()
            .iter()
            .find(|(id, key, value, _)| id == template_id && vars.get(key) == Some(value))
            .map(|(_, _, _, delay)| *delay)
            .or_else(|| self.delays.lock().unwrap().get(template_id).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(template_id)
            .and_then(|q| q.pop_front());
        if let Some(response) = queued {
            return response;
        }
        self.always
            .lock()
            .unwrap()
            .get(template_id)
            .cloned()
            .ok_or_else(|| LlmError::Backend(format!("no scripted response for {template_id}")))
    }
}

/// Every call fails.
#[derive(Default)]
pub struct FailingBackend {
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for FailingBackend {
    async fn invoke(&self, _template_id: &str, _vars: &Value) -> Result<Value, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::Backend("backend unavailable".to_string()))
    }
}
