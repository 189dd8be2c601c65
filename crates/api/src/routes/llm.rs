//! Generation endpoints: synchronous, streaming, cancel and model listing.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderName};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use fanout::{
    resolve_attachments, BranchResult, BranchSelection, FanoutError, FanoutRequest,
};
use futures::{future, StreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::routes::{done, Envelope};
use crate::sse::{self, Mode};
use crate::state::AppState;

/// Providers used by the two-box layout when none are given.
const DEFAULT_FIRST: &str = "openai";
const DEFAULT_SECOND: &str = "anthropic";

/// The `provider` value that selects multi-branch streaming.
const DUAL: &str = "dual";

/// Body of the generate and stream endpoints.
///
/// Branches come from `selections` when present. Otherwise the two-box
/// layout applies: `firstProvider` and `secondProvider` with per-provider
/// `<provider>Model` / `<provider>Temperature` fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRequest {
    pub prompt: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    /// Stream target: a provider id or `dual`.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub first_provider: Option<String>,
    pub second_provider: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
    pub gemini_model: Option<String>,
    pub grok_model: Option<String>,
    pub openai_temperature: Option<f32>,
    pub anthropic_temperature: Option<f32>,
    pub gemini_temperature: Option<f32>,
    pub grok_temperature: Option<f32>,
    pub selections: Option<Vec<BranchSelection>>,
}

impl LlmRequest {
    /// The non-blank prompt.
    fn prompt(&self) -> Result<&str> {
        self.prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ApiError::Validation(FanoutError::MissingPrompt))
    }

    fn provider_model(&self, provider: &str) -> Option<&String> {
        match provider {
            "openai" => self.openai_model.as_ref(),
            "anthropic" => self.anthropic_model.as_ref(),
            "gemini" => self.gemini_model.as_ref(),
            "grok" => self.grok_model.as_ref(),
            _ => None,
        }
    }

    fn provider_temperature(&self, provider: &str) -> Option<f32> {
        match provider {
            "openai" => self.openai_temperature,
            "anthropic" => self.anthropic_temperature,
            "gemini" => self.gemini_temperature,
            "grok" => self.grok_temperature,
            _ => None,
        }
    }

    fn selection(&self, provider: &str, model: Option<&String>, temperature: Option<f32>) -> BranchSelection {
        BranchSelection {
            provider: provider.to_string(),
            model: model.cloned(),
            temperature,
        }
    }

    /// Branches for the generate endpoint and dual streaming.
    fn branch_selections(&self) -> Vec<BranchSelection> {
        if let Some(selections) = self.selections.as_ref().filter(|s| !s.is_empty()) {
            return selections.clone();
        }

        let first = self.first_provider.as_deref().unwrap_or(DEFAULT_FIRST);
        let second = self.second_provider.as_deref().unwrap_or(DEFAULT_SECOND);

        [first, second]
            .into_iter()
            .map(|provider| {
                self.selection(
                    provider,
                    self.provider_model(provider),
                    self.provider_temperature(provider).or(self.temperature),
                )
            })
            .collect()
    }

    /// The branch for single-provider streaming.
    fn single_selection(&self, provider: &str) -> BranchSelection {
        self.selection(
            provider,
            self.model.as_ref().or(self.provider_model(provider)),
            self.temperature.or(self.provider_temperature(provider)),
        )
    }
}

/// Payload of a successful generate call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateData {
    pub branch_results: Vec<BranchResult>,
    /// First branch, for two-box clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<BranchResult>,
    /// Second branch, for two-box clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<BranchResult>,
}

/// Run every branch to completion and return all results.
pub async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LlmRequest>, JsonRejection>,
) -> Result<Json<Envelope<GenerateData>>> {
    let Json(body) = payload?;
    let prompt = body.prompt()?;
    let attachments = resolve_attachments(state.attachments.as_ref(), &body.file_ids).await;
    let request = FanoutRequest::new(prompt, body.branch_selections()).with_attachments(attachments);

    let branch_results = state.orchestrator.generate_all(&request).await?;
    state.stats.increment().await;

    info!(
        branches = branch_results.len(),
        succeeded = branch_results.iter().filter(|r| r.success).count(),
        "Generate request finished"
    );

    let first = branch_results.first().cloned();
    let second = branch_results.get(1).cloned();

    Ok(Envelope::ok(GenerateData {
        branch_results,
        first,
        second,
    }))
}

/// Stream one provider, or several with `provider: "dual"`, as SSE.
///
/// The response carries an `x-request-id` header that can be passed to
/// the cancel endpoint.
pub async fn stream(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LlmRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(body) = payload?;
    let prompt = body.prompt()?;
    let registry = state.orchestrator.registry();

    let provider = body.provider.as_deref().unwrap_or_default();
    let (mode, selections) = if provider == DUAL {
        (Mode::Multi, body.branch_selections())
    } else if registry.contains(provider) {
        (Mode::Single, vec![body.single_selection(provider)])
    } else {
        return Err(ApiError::BadRequest(format!(
            "Provider debe ser: {} o {}",
            registry.ids().join(", "),
            DUAL
        )));
    };

    let attachments = resolve_attachments(state.attachments.as_ref(), &body.file_ids).await;
    let request = FanoutRequest::new(prompt, selections).with_attachments(attachments);

    let request_id = Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    let events = state.orchestrator.stream(request, cancel.clone())?;
    let registration = state.streams.register(request_id.clone(), cancel);
    state.stats.increment().await;

    info!(request_id = %request_id, provider = %provider, ?mode, "Stream started");

    let frames = events.filter_map(move |event| {
        let _registration = &registration;
        future::ready(sse::encode(&event, mode).map(Ok::<_, Infallible>))
    });

    let headers = [
        (HeaderName::from_static("x-request-id"), request_id),
        (header::CACHE_CONTROL, "no-cache".to_string()),
    ];

    Ok((headers, Sse::new(frames).keep_alive(KeepAlive::default())).into_response())
}

/// Cancel an in-flight stream by request id.
pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
    if !state.streams.cancel(&id) {
        return Err(ApiError::NotFound("Stream no encontrado".to_string()));
    }
    info!(request_id = %id, "Stream cancelled by client");
    Ok(done("Stream cancelado"))
}

/// Every provider's models, in priority order.
pub async fn models(State(state): State<AppState>) -> Json<Envelope<IndexMap<String, Vec<String>>>> {
    Envelope::ok(state.orchestrator.registry().models())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use fanout::ProviderRegistry;
    use mock_provider::{DelayedProvider, EchoProvider, FailingProvider, ProviderError};
    use serde_json::{json, Value};

    use super::*;
    use crate::routes::test_support::{app, call, call_json, registry, state, state_with, text};

    /// Decode the `data:` frames of an SSE body.
    fn frames(body: &str) -> Vec<Value> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[test]
    fn test_branch_selections_defaults() {
        let body = LlmRequest {
            openai_model: Some("gpt-3.5-turbo-0125".into()),
            anthropic_temperature: Some(0.2),
            temperature: Some(0.9),
            ..Default::default()
        };

        assert_eq!(
            body.branch_selections(),
            vec![
                BranchSelection::new("openai")
                    .with_model("gpt-3.5-turbo-0125")
                    .with_temperature(0.9),
                BranchSelection::new("anthropic").with_temperature(0.2),
            ]
        );

        let body = LlmRequest {
            first_provider: Some("gemini".into()),
            second_provider: Some("grok".into()),
            grok_model: Some("grok-2-vision-1212".into()),
            ..Default::default()
        };
        assert_eq!(
            body.branch_selections(),
            vec![
                BranchSelection::new("gemini"),
                BranchSelection::new("grok").with_model("grok-2-vision-1212"),
            ]
        );
    }

    #[test]
    fn test_explicit_selections_win() {
        let body = LlmRequest {
            first_provider: Some("gemini".into()),
            selections: Some(vec![BranchSelection::new("grok"), BranchSelection::new("grok")]),
            ..Default::default()
        };
        assert_eq!(body.branch_selections().len(), 2);
        assert!(body.branch_selections().iter().all(|s| s.provider == "grok"));
    }

    #[tokio::test]
    async fn test_generate_two_boxes() {
        let app = app(state().await);

        let (status, json) = call_json(
            &app,
            "POST",
            "/api/llm/generate",
            Some(json!({ "prompt": "Explain recursion", "openaiTemperature": 0.3 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["branchResults"].as_array().unwrap().len(), 2);
        assert_eq!(json["data"]["first"]["provider"], "openai");
        assert_eq!(json["data"]["first"]["response"], "Explain recursion");
        assert_eq!(json["data"]["first"]["model"], "gpt-4o-mini-2024-07-18");
        assert_eq!(json["data"]["first"]["temperature"], 0.3);
        assert_eq!(json["data"]["second"]["provider"], "anthropic");
        assert_eq!(json["data"]["second"]["model"], "claude-3-5-haiku-latest");
        assert_eq!(json["data"]["second"]["temperature"], 0.7);
    }

    #[tokio::test]
    async fn test_generate_failed_branch_is_reported() {
        let registry = ProviderRegistry::new()
            .with(EchoProvider::new("openai"))
            .with(FailingProvider::new(
                "anthropic",
                ProviderError::credential_missing("Anthropic", "ANTHROPIC_API_KEY"),
            ));
        let app = app(state_with(registry, "development").await);

        let (status, json) = call_json(&app, "POST", "/api/llm/generate", Some(json!({ "prompt": "hola" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["first"]["success"], true);
        assert_eq!(json["data"]["second"]["success"], false);
        assert_eq!(
            json["data"]["second"]["response"],
            "API Key de Anthropic no configurada. Por favor, configure ANTHROPIC_API_KEY en el archivo .env"
        );
    }

    #[tokio::test]
    async fn test_generate_with_attachment() {
        let app = app(state().await);

        let upload = json!({ "name": "informe.pdf", "mimeType": "application/pdf", "text": "texto" });
        let (_, json) = call_json(&app, "POST", "/api/upload/file", Some(upload)).await;
        let id = json["data"]["id"].clone();

        let (status, json) = call_json(
            &app,
            "POST",
            "/api/llm/generate",
            Some(json!({ "prompt": "Resume", "fileIds": [id, "expired"] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let openai = &json["data"]["first"];
        assert_eq!(openai["filesProcessed"], false);
        assert_eq!(
            openai["fileWarnings"],
            json!(["gpt-4o-mini-2024-07-18: El modelo gpt-4o-mini-2024-07-18 no soporta análisis de PDFs"])
        );
        let anthropic = &json["data"]["second"];
        assert_eq!(anthropic["filesProcessed"], true);
        assert_eq!(anthropic["attachedFiles"], json!([{ "name": "informe.pdf", "type": "pdf" }]));
    }

    #[tokio::test]
    async fn test_generate_validation() {
        let app = app(state().await);

        let (status, json) = call_json(&app, "POST", "/api/llm/generate", Some(json!({ "prompt": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "success": false, "error": "El prompt es requerido" }));

        let (status, json) = call_json(
            &app,
            "POST",
            "/api/llm/generate",
            Some(json!({ "prompt": "hola", "openaiTemperature": 2.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let app = app(state().await);
        let expected = json!({ "success": false, "error": "Cuerpo de la solicitud inválido" });

        for uri in ["/api/llm/generate", "/api/llm/stream"] {
            let (status, json) = call_json(&app, "POST", uri, Some(json!({ "prompt": 5 }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(json, expected);
        }

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/llm/generate")
            .body(axum::body::Body::from(r#"{"prompt":"hola"}"#))
            .unwrap();
        let response = tower::ServiceExt::oneshot(app.clone(), request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(json, expected);

        let (_, json) = call_json(&app, "GET", "/api/statistics", None).await;
        assert_eq!(json["data"]["promptCount"], 0);
    }

    #[tokio::test]
    async fn test_stream_single_provider() {
        let app = app(state().await);

        let response = call(
            &app,
            "POST",
            "/api/llm/stream",
            Some(json!({ "prompt": "Hola mundo", "provider": "gemini", "temperature": 0.5 })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let events = frames(&text(response).await);
        assert_eq!(
            events,
            vec![
                json!({ "content": "Hola ", "provider": "gemini" }),
                json!({ "content": "mundo", "provider": "gemini" }),
                json!({ "done": true, "provider": "gemini", "model": "gemini-2.0-flash-lite", "temperature": 0.5 }),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_dual() {
        let app = app(state().await);

        let response = call(
            &app,
            "POST",
            "/api/llm/stream",
            Some(json!({ "prompt": "Explain recursion", "provider": "dual" })),
        )
        .await;
        let events = frames(&text(response).await);

        let openai: String = events.iter().filter_map(|e| e["openai"].as_str()).collect();
        let anthropic: String = events.iter().filter_map(|e| e["anthropic"].as_str()).collect();
        assert_eq!(openai, "Explain recursion");
        assert_eq!(anthropic, "Explain recursion");

        let branch_done = events.iter().filter(|e| e["type"] == "branch_done").count();
        assert_eq!(branch_done, 2);
        assert_eq!(events.last(), Some(&json!({ "done": true })));
        assert_eq!(events.iter().filter(|e| e["done"] == true).count(), 1);
    }

    #[tokio::test]
    async fn test_stream_unknown_provider() {
        let app = app(state().await);

        let (status, json) = call_json(
            &app,
            "POST",
            "/api/llm/stream",
            Some(json!({ "prompt": "hola", "provider": "mistral" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Provider debe ser: openai, anthropic, gemini, grok o dual");
    }

    #[tokio::test]
    async fn test_stream_cancel() {
        let registry = ProviderRegistry::new()
            .with(DelayedProvider::new(EchoProvider::new("openai"), Duration::from_secs(30)))
            .with(DelayedProvider::new(EchoProvider::new("anthropic"), Duration::from_secs(30)));
        let state = state_with(registry, "development").await;
        let streams = state.streams.clone();
        let app = app(state);

        let response = call(
            &app,
            "POST",
            "/api/llm/stream",
            Some(json!({ "prompt": "Explain recursion", "provider": "dual" })),
        )
        .await;
        let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
        assert!(streams.contains(&id));

        let (status, json) = call_json(&app, "POST", &format!("/api/llm/stream/{}/cancel", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Stream cancelado");

        let events = frames(&text(response).await);
        assert!(events.iter().all(|e| e["done"] != true));
        assert!(!streams.contains(&id));

        let (status, _) = call_json(&app, "POST", &format!("/api/llm/stream/{}/cancel", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_models() {
        let app = app(state_with(registry(), "development").await);
        let (status, json) = call_json(&app, "GET", "/api/llm/models", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["data"],
            json!({
                "openai": ["gpt-4o-mini-2024-07-18", "gpt-3.5-turbo-0125"],
                "anthropic": ["claude-3-5-haiku-latest"],
                "gemini": ["gemini-2.0-flash-lite", "gemini-2.0-flash"],
                "grok": ["grok-3-mini-fast", "grok-2-vision-1212"],
            })
        );
    }
}
