// Coach agent: per-turn feedback, the final summary, and resource
// recommendations. Runs off the interviewer's critical path.

pub mod evaluator;
pub mod prompts;
pub mod resources;
pub mod search;
