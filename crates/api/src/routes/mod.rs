//! Route handlers for the HTTP API.

pub mod health;
pub mod llm;
pub mod statistics;
pub mod upload;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// `{"success": true, "message": ...}` for operations without a payload.
pub fn done(message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": message,
    }))
}

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/api/health", get(health::health))
        // Generation
        .route("/api/llm/generate", post(llm::generate))
        .route("/api/llm/stream", post(llm::stream))
        .route("/api/llm/stream/:id/cancel", post(llm::cancel))
        .route("/api/llm/models", get(llm::models))
        // Attachments
        .route("/api/upload/check-capabilities", post(upload::check_capabilities))
        .route("/api/upload/file", post(upload::register_file))
        .route(
            "/api/upload/file/:id",
            get(upload::get_file).delete(upload::delete_file),
        )
        // Statistics
        .route("/api/statistics", get(statistics::get_statistics))
        .route("/api/statistics/reset", post(statistics::reset_statistics))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use fanout::{AttachmentStore, Orchestrator, OrchestratorConfig, ProviderRegistry};
    use mock_provider::EchoProvider;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::AppState;
    use crate::stats::tests::temp_stats_path;
    use crate::stats::StatisticsStore;

    /// The four providers as echo mocks, with their real model lists.
    pub fn registry() -> ProviderRegistry {
        ProviderRegistry::new()
            .with(EchoProvider::new("openai").with_models(["gpt-4o-mini-2024-07-18", "gpt-3.5-turbo-0125"]))
            .with(EchoProvider::new("anthropic").with_models(["claude-3-5-haiku-latest"]))
            .with(EchoProvider::new("gemini").with_models(["gemini-2.0-flash-lite", "gemini-2.0-flash"]))
            .with(EchoProvider::new("grok").with_models(["grok-3-mini-fast", "grok-2-vision-1212"]))
    }

    pub async fn state_with(registry: ProviderRegistry, environment: &str) -> AppState {
        AppState::new(
            Orchestrator::new(registry, OrchestratorConfig::default()),
            Arc::new(AttachmentStore::default()),
            Arc::new(StatisticsStore::load(temp_stats_path()).await),
            environment,
        )
    }

    pub async fn state() -> AppState {
        state_with(registry(), "development").await
    }

    pub fn app(state: AppState) -> Router {
        super::router().with_state(state)
    }

    pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        app.clone().oneshot(request.unwrap()).await.unwrap()
    }

    pub async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Call and decode a JSON response.
    pub async fn call_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = call(app, method, uri, body).await;
        let status = response.status();
        let json = serde_json::from_str(&text(response).await).unwrap();
        (status, json)
    }
}
