// All LLM prompt constants for the Interviewer agent.
// Placeholders in `{braces}` are filled by `llm_client::prompts::render`.

/// System prompt for job-specific question generation.
pub const JOB_QUESTIONS_SYSTEM: &str = "You are an experienced hiring manager preparing \
    interview questions tailored to a specific role and candidate. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Job-specific question prompt.
pub const JOB_QUESTIONS_PROMPT: &str = r#"Prepare {count} interview questions for a {difficulty} {interview_style} interview.

Role: {job_role}
Company: {company_name}
Job description:
{job_description}

Candidate resume:
{resume_content}

Rules:
- Each question must be answerable in two to four minutes of speech.
- Ground questions in the job description and resume when they are provided.
- Do NOT ask the candidate to introduce themselves; that question is already planned.
- Do NOT repeat or paraphrase another question in the list.

Return a JSON object with this EXACT schema:
{
  "questions": [
    {"text": "How would you design ...?", "justification": "The role owns ..."}
  ]
}"#;

/// System prompt for the turn-by-turn interview decision.
pub const NEXT_ACTION_SYSTEM: &str = "You are a professional interviewer deciding how to \
    continue a live interview. You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Next-action decision prompt.
pub const NEXT_ACTION_PROMPT: &str = r#"You are interviewing a candidate for the role of {job_role}.
Interview style: {interview_style}. Planned length: about {target_duration_minutes} minutes.

Questions asked so far: {asked_count} of {target_question_count}.
Follow-ups already asked on the current question: {follow_ups_on_current}.

Current question:
{current_question}

Candidate's latest answer:
{last_answer}

Conversation so far:
{history}

Choose exactly one action:
- "ask_follow_up" when the answer is vague, incomplete, or invites a deeper probe.
- "ask_new_question" when the answer is sufficient and more planned questions remain.
- "end_interview" when the interview has reached a natural conclusion.

Return a JSON object with this EXACT schema:
{
  "action": "ask_new_question",
  "acknowledgement": "One short sentence acknowledging the answer, or empty.",
  "reasoning": "Why this action was chosen."
}"#;

/// System prompt for follow-up question generation.
pub const FOLLOW_UP_SYSTEM: &str = "You are a professional interviewer. Ask one concise \
    follow-up question that digs into the candidate's previous answer. \
    You MUST respond with valid JSON only.";

/// Follow-up prompt.
pub const FOLLOW_UP_PROMPT: &str = r#"Role: {job_role}. Interview style: {interview_style}.

Original question:
{question}

Candidate's answer:
{answer}

Write a single follow-up question that references something specific the candidate said.

Return a JSON object with this EXACT schema:
{
  "follow_up": "You mentioned ... Could you ...?"
}"#;
