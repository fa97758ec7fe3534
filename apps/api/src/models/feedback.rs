use serde::{Deserialize, Serialize};

/// Coach feedback for one answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub turn_index: usize,
    pub question: String,
    pub answer: String,
    /// 0 – 10
    pub score: u8,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    /// True when the record is the neutral default rather than a real evaluation.
    #[serde(default)]
    pub is_fallback: bool,
}

/// A learning-material reference suggested to the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    pub description: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub relevance_score: f32,
    /// Focus-area topic the resource was found for.
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub patterns_tendencies: String,
    pub strengths: String,
    pub weaknesses: String,
    pub improvement_focus_areas: Vec<String>,
    pub resource_search_topics: Vec<String>,
    pub recommended_resources: Vec<Resource>,
}

impl FinalSummary {
    pub fn resources_for<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.recommended_resources
            .iter()
            .filter(move |r| r.topic.eq_ignore_ascii_case(topic))
    }
}
