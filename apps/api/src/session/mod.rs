// Session orchestration: owns sessions, dispatches turns to the interviewer
// and coach, and schedules background feedback.

pub mod agents;
pub mod handlers;
pub mod manager;
pub mod models;
