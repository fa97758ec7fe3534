// Shared prompt fragments and the template registry.
// Each agent defines its own prompts.rs alongside it; this file only maps
// template ids to those constants and fills placeholders.

use serde_json::Value;

use crate::coaching::prompts as coach;
use crate::interview::prompts as interviewer;

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub system: &'static str,
    pub user: &'static str,
}

pub fn lookup(template_id: &str) -> Option<PromptTemplate> {
    let (system, user) = match template_id {
        "job_questions" => (interviewer::JOB_QUESTIONS_SYSTEM, interviewer::JOB_QUESTIONS_PROMPT),
        "next_action" => (interviewer::NEXT_ACTION_SYSTEM, interviewer::NEXT_ACTION_PROMPT),
        "follow_up" => (interviewer::FOLLOW_UP_SYSTEM, interviewer::FOLLOW_UP_PROMPT),
        "turn_feedback" => (coach::TURN_FEEDBACK_SYSTEM, coach::TURN_FEEDBACK_PROMPT),
        "final_summary" => (coach::FINAL_SUMMARY_SYSTEM, coach::FINAL_SUMMARY_PROMPT),
        _ => return None,
    };
    Some(PromptTemplate { system, user })
}

/// Replaces every `{key}` with the matching entry of `vars`. Strings are
/// inserted verbatim, everything else as compact JSON, null as empty.
/// Single pass over the template: inserted text is never scanned again.
pub fn render(template: &str, vars: &Value) -> String {
    let map = vars.as_object();
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let tail = &rest[open..];
        let key = tail[1..]
            .find(['{', '}'])
            .filter(|&end| tail.as_bytes()[end + 1] == b'}')
            .map(|end| &tail[1..end + 1]);

        match key.and_then(|k| map.and_then(|m| m.get(k)).map(|v| (k, v))) {
            Some((k, value)) => {
                match value {
                    Value::String(s) => rendered.push_str(s),
                    Value::Null => {}
                    other => rendered.push_str(&other.to_string()),
                }
                rest = &tail[k.len() + 2..];
            }
            None => {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
    }
    rendered.push_str(rest);
    rendered
}
