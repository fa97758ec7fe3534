// Interviewer agent: question bank construction and the interview phase
// state machine. All LLM calls go through llm_client::LlmGateway.

pub mod interviewer;
pub mod prompts;
pub mod question_bank;
pub mod templates;
