use crate::coaching::evaluator::feedback_turn;
use crate::interview::interviewer::InterviewerAgent;
use crate::models::session::{AgentKind, Turn};
use crate::session::models::Session;

/// The fixed set of agents a caller can address directly.
pub enum Agent<'a> {
    Interviewer(&'a InterviewerAgent),
    Coach,
}

impl Agent<'_> {
    pub fn kind(&self) -> AgentKind {
        match self {
            Agent::Interviewer(_) => AgentKind::Interviewer,
            Agent::Coach => AgentKind::Coach,
        }
    }

    /// Produces the agent's next turn for `session`.
    ///
    /// The interviewer repeats an unanswered question or moves the interview
    /// on. The coach reports the most recent completed feedback and never
    /// waits on in-flight evaluations.
    pub async fn process(&self, session: &mut Session) -> Turn {
        match self {
            Agent::Interviewer(interviewer) => interviewer.nudge(session).await,
            Agent::Coach => feedback_turn(session.feedback_log.latest()),
        }
    }
}
