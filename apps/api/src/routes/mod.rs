pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(handlers::handle_start_session))
        .route(
            "/api/v1/sessions/:id/messages",
            post(handlers::handle_send_message),
        )
        .route("/api/v1/sessions/:id/end", post(handlers::handle_end_session))
        .route(
            "/api/v1/sessions/:id/history",
            get(handlers::handle_get_history),
        )
        .route("/api/v1/sessions/:id/stats", get(handlers::handle_get_stats))
        .route(
            "/api/v1/sessions/:id/agents/:agent",
            post(handlers::handle_request_agent),
        )
        // Observability
        .route("/api/v1/events", get(handlers::handle_list_events))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::coaching::search::NoopSearchProvider;
    use crate::events::EventBus;
    use crate::llm_client::testing::{test_settings, FailingBackend};
    use crate::llm_client::LlmGateway;
    use crate::session::manager::SessionManager;

    fn app() -> Router {
        let settings = test_settings();
        let events = Arc::new(EventBus::new(settings.event_history_capacity));
        let gateway = Arc::new(LlmGateway::new(
            Arc::new(FailingBackend::new()),
            Arc::clone(&events),
            &settings,
        ));
        let sessions = Arc::new(SessionManager::new(
            gateway,
            Arc::new(NoopSearchProvider),
            Arc::clone(&events),
            &settings,
        ));
        build_router(AppState { sessions, events })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(b) => Body::from(b.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_session_round_trip_over_http() {
        let app = app();
        let (status, started) = call(
            &app,
            "POST",
            "/api/v1/sessions",
            Some(json!({ "job_role": "Backend Engineer", "target_question_count": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(started["intro"]["content"]
            .as_str()
            .unwrap()
            .contains("Backend Engineer"));
        let id = started["session_id"].as_str().unwrap().to_string();

        let (status, turn) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/messages"),
            Some(json!({ "content": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(turn["response_type"], "question");

        call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/messages"),
            Some(json!({ "text": "my answer" })),
        )
        .await;

        let (status, result) = call(&app, "POST", &format!("/api/v1/sessions/{id}/end"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["per_turn_feedback"].as_array().unwrap().len(), 1);

        let (_, history) = call(&app, "GET", &format!("/api/v1/sessions/{id}/history"), None).await;
        assert_eq!(history.as_array().unwrap().len(), 5);

        let (_, stats) = call(&app, "GET", &format!("/api/v1/sessions/{id}/stats"), None).await;
        assert_eq!(stats["phase"], "COMPLETED");
        assert_eq!(stats["questions_asked"], 1);

        let (status, events) = call(&app, "GET", "/api/v1/events?event_type=SESSION_END&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(events.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_400() {
        let (status, body) = call(
            &app(),
            "POST",
            "/api/v1/sessions",
            Some(json!({ "job_role": "", "target_question_count": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let uri = format!("/api/v1/sessions/{}/history", uuid::Uuid::new_v4());
        let (status, body) = call(&app(), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_agent_is_404() {
        let app = app();
        let (_, started) = call(
            &app,
            "POST",
            "/api/v1/sessions",
            Some(json!({ "job_role": "Data Engineer" })),
        )
        .await;
        let id = started["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "POST", &format!("/api/v1/sessions/{id}/agents/recruiter"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "AGENT_NOT_FOUND");

        let (status, body) = call(&app, "POST", &format!("/api/v1/sessions/{id}/agents/coach"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["agent"], "coach");
    }

    #[tokio::test]
    async fn test_event_limit_is_validated() {
        let (status, body) = call(&app(), "GET", "/api/v1/events?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
