//! Resource curation for the final summary. Paid links are dropped and the rest ranked per topic.
//!
//! Relevance = 0.5 × provider score + 0.4 × topic keyword coverage
//! + 0.1 bonus for free-format types (documentation, article, video, tutorial).

use std::collections::HashSet;

use reqwest::Url;

use crate::models::feedback::Resource;

const PAID_TYPES: &[&str] = &["paid", "premium", "subscription", "course_paid", "paid_course"];

const PAID_DOMAINS: &[&str] = &[
    "udemy.com",
    "pluralsight.com",
    "masterclass.com",
    "educative.io",
    "oreilly.com",
    "skillshare.com",
    "linkedin.com/learning",
];

const PAID_TITLE_MARKERS: &[&str] = &["premium", "paid", "subscription required"];

const FREE_FORMAT_TYPES: &[&str] = &["documentation", "article", "video", "tutorial"];

/// Guesses a resource type from its URL.
pub fn infer_resource_type(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    if lower.contains("youtube.com") || lower.contains("youtu.be") || lower.contains("vimeo.com") {
        "video"
    } else if lower.contains("docs.") || lower.contains("/docs") || lower.contains("documentation") {
        "documentation"
    } else if lower.contains("github.com") {
        "repository"
    } else if lower.contains("tutorial") {
        "tutorial"
    } else {
        "article"
    }
}

pub fn is_paid(resource: &Resource) -> bool {
    let resource_type = resource.resource_type.to_ascii_lowercase();
    if PAID_TYPES.contains(&resource_type.as_str()) {
        return true;
    }

    let title = resource.title.to_ascii_lowercase();
    if PAID_TITLE_MARKERS.iter().any(|m| title.contains(m)) {
        return true;
    }

    match Url::parse(&resource.url) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
            let host_and_path = format!("{host}{}", url.path().to_ascii_lowercase());
            PAID_DOMAINS.iter().any(|d| {
                if d.contains('/') {
                    host_and_path.contains(d) || host_and_path.contains(&format!("www.{d}"))
                } else {
                    host == *d || host.ends_with(&format!(".{d}"))
                }
            })
        }
        // Unparseable links are unusable anyway.
        Err(_) => true,
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

pub fn relevance(topic: &str, resource: &Resource) -> f32 {
    let topic_tokens = tokens(topic);
    let coverage = if topic_tokens.is_empty() {
        0.0
    } else {
        let haystack = tokens(&format!("{} {}", resource.title, resource.description));
        topic_tokens.intersection(&haystack).count() as f32 / topic_tokens.len() as f32
    };
    let bonus = if FREE_FORMAT_TYPES.contains(&resource.resource_type.to_ascii_lowercase().as_str())
    {
        0.1
    } else {
        0.0
    };
    (0.5 * resource.relevance_score.clamp(0.0, 1.0) + 0.4 * coverage + bonus).clamp(0.0, 1.0)
}

/// Drops duplicate links (and paid ones when `exclude_paid` is set),
/// rescores, and keeps the best `top_n`.
pub fn curate(topic: &str, raw: Vec<Resource>, top_n: usize, exclude_paid: bool) -> Vec<Resource> {
    let mut seen_urls = HashSet::new();
    let mut kept: Vec<Resource> = raw
        .into_iter()
        .filter(|r| !r.title.trim().is_empty() && !(exclude_paid && is_paid(r)))
        .filter(|r| seen_urls.insert(r.url.trim_end_matches('/').to_ascii_lowercase()))
        .map(|mut r| {
            r.relevance_score = relevance(topic, &r);
            r.topic = topic.to_string();
            r
        })
        .collect();

    kept.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    kept.truncate(top_n);
    kept
}
