//! Resource search collaborator.
//!
//! `SearchProvider` is the narrow contract the coach consumes. An empty
//! result is a normal outcome; errors are absorbed by the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::coaching::resources::infer_resource_type;
use crate::models::feedback::Resource;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Search timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Search unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchFilters {
    pub exclude_paid: bool,
    pub max_results: usize,
    /// Extra context appended to the query, e.g. the job role.
    pub context: Option<String>,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            exclude_paid: true,
            max_results: 8,
            context: None,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn find(&self, topic: &str, filters: &SearchFilters) -> Result<Vec<Resource>, SearchError>;
}

/// Used when no search backend is configured.
pub struct NoopSearchProvider;

#[async_trait]
impl SearchProvider for NoopSearchProvider {
    async fn find(
        &self,
        _topic: &str,
        _filters: &SearchFilters,
    ) -> Result<Vec<Resource>, SearchError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: String,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Web search via the Tavily API.
pub struct TavilySearchProvider {
    client: Client,
    api_key: String,
}

impl TavilySearchProvider {
    pub fn new(api_key: String, timeout: std::time::Duration) -> Result<Self, SearchError> {
        if api_key.trim().is_empty() {
            return Err(SearchError::Unavailable("Tavily API key is empty".to_string()));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearchProvider {
    async fn find(&self, topic: &str, filters: &SearchFilters) -> Result<Vec<Resource>, SearchError> {
        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&TavilyRequest {
                api_key: &self.api_key,
                query: search_query(topic, filters),
                max_results: filters.max_results,
                search_depth: "basic",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: TavilyResponse = response.json().await?;
        debug!(topic, hits = body.results.len(), "Resource search returned");

        Ok(body
            .results
            .into_iter()
            .map(|r| Resource {
                resource_type: infer_resource_type(&r.url).to_string(),
                title: r.title,
                description: r.content.chars().take(300).collect(),
                url: r.url,
                relevance_score: r.score.unwrap_or(0.0).clamp(0.0, 1.0),
                topic: topic.to_string(),
            })
            .collect())
    }
}

fn search_query(topic: &str, filters: &SearchFilters) -> String {
    let mut query = if filters.exclude_paid {
        format!("{topic} free tutorial guide")
    } else {
        format!("{topic} tutorial guide")
    };
    if let Some(context) = &filters.context {
        query.push_str(&format!(" for {context}"));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_provider_returns_nothing() {
        let hits = NoopSearchProvider
            .find("System Design", &SearchFilters::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_tavily_response_tolerates_missing_fields() {
        let body: TavilyResponse = serde_json::from_str(
            r#"{"results": [{"title": "Intro", "url": "https://example.org"}]}"#,
        )
        .unwrap();
        assert_eq!(body.results.len(), 1);
        assert!(body.results[0].score.is_none());
        assert!(body.results[0].content.is_empty());
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        let result = TavilySearchProvider::new("  ".to_string(), std::time::Duration::from_secs(1));
        assert!(matches!(result, Err(SearchError::Unavailable(_))));
    }

    #[test]
    fn test_search_query_follows_filters() {
        let filters = SearchFilters {
            context: Some("Backend Engineer".to_string()),
            ..SearchFilters::default()
        };
        assert_eq!(
            search_query("Caching", &filters),
            "Caching free tutorial guide for Backend Engineer"
        );

        let filters = SearchFilters {
            exclude_paid: false,
            ..SearchFilters::default()
        };
        assert_eq!(search_query("Caching", &filters), "Caching tutorial guide");
    }
}
