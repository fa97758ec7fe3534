//! Template question pools, the deterministic fallback content for the question bank.
//!
//! Pools are keyed by interview style and difficulty. `{job_role}` is
//! substituted at build time. A style/difficulty pair resolves to its style
//! pool, then its difficulty pool, then the general pool, in that order.

use crate::models::session::{Difficulty, InterviewStyle, SessionConfig};

/// The first question of every interview.
pub fn opening_question(config: &SessionConfig) -> String {
    format!(
        "To start, could you tell me a little about yourself and what draws you to this {} role?",
        config.job_role.trim()
    )
}

fn style_pool(style: InterviewStyle) -> Vec<&'static str> {
    match style {
        InterviewStyle::Formal => vec![
            "Walk me through the professional accomplishment you are most proud of and your specific contribution to it.",
            "How do you prioritise competing deadlines when several stakeholders depend on your work?",
            "Describe a time you had to adapt to a significant change in project requirements.",
            "What do you consider the most important responsibilities of a {job_role}?",
            "Where would you like your career to be in three years, and how does this position fit that plan?",
        ],
        InterviewStyle::Casual => vec![
            "What kind of work gets you genuinely excited on a Monday morning?",
            "Tell me about a project you worked on just because you found it interesting.",
            "What does a great team look like to you?",
            "What is something you learned recently that changed how you work?",
            "If a friend asked what a {job_role} actually does all day, what would you tell them?",
        ],
        InterviewStyle::Technical => vec![
            "Describe the architecture of a system you built and the trade-offs you made along the way.",
            "How do you approach debugging a problem you cannot reproduce locally?",
            "Tell me about a time you improved the performance of a piece of software. How did you measure it?",
            "How do you decide when code is ready to ship?",
            "Which technical skill is most critical for a {job_role}, and how have you developed it?",
        ],
        InterviewStyle::Behavioral => vec![
            "Tell me about a time you disagreed with a colleague. How did you resolve it?",
            "Describe a situation where you failed to meet a goal. What happened next?",
            "Give an example of a time you took ownership of a problem nobody else was addressing.",
            "Tell me about a time you had to deliver difficult feedback.",
            "Describe a moment when you had to learn something quickly to get the job done.",
        ],
    }
}

fn difficulty_pool(difficulty: Difficulty) -> Vec<&'static str> {
    match difficulty {
        Difficulty::Easy => vec![
            "What parts of your previous roles did you enjoy the most?",
            "How do you keep your skills up to date?",
            "What are you hoping to learn in your next position?",
            "How would your previous teammates describe you?",
        ],
        Difficulty::Medium => vec![
            "Describe a complex problem you solved and how you broke it down.",
            "Tell me about a decision you made with incomplete information. How did it turn out?",
            "How do you handle feedback that you disagree with?",
            "What would you do in your first ninety days as a {job_role}?",
        ],
        Difficulty::Hard => vec![
            "Tell me about the biggest mistake of your career and what it cost.",
            "Describe a time you had to convince senior leadership to change direction. What was your evidence?",
            "If you joined and found the team's main project was failing, what would you do in your first week?",
            "What is a strongly held opinion about your field that most of your peers disagree with?",
        ],
    }
}

fn general_pool() -> Vec<&'static str> {
    vec![
        "What motivates you to do your best work?",
        "Describe your ideal working environment.",
        "What do you consider your greatest professional strength?",
        "What is an area of your work you are actively trying to improve?",
        "Tell me about a time you went beyond what was expected of you.",
        "Why should we choose you for this {job_role} position?",
    ]
}

/// Ordered, duplicate-free template pool for a session, with `{job_role}` filled in.
pub fn template_pool(config: &SessionConfig) -> Vec<String> {
    let role = config.job_role.trim();
    let mut pool: Vec<String> = Vec::new();
    for text in style_pool(config.interview_style)
        .into_iter()
        .chain(difficulty_pool(config.difficulty))
        .chain(general_pool())
    {
        let text = text.replace("{job_role}", role);
        if !pool.contains(&text) {
            pool.push(text);
        }
    }
    pool
}
