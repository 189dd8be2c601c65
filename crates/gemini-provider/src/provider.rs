//! GeminiProvider implementation.

use provider_core::sse::{self, Frame};
use provider_core::{
    async_trait, attachment_parts, CancellationToken, Completion, ContentPart, EventStream,
    GenerateRequest, Provider, ProviderConfig, ProviderError,
};
use reqwest::Client;
use tracing::{debug, info};

use crate::api_types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};
use crate::config::config_from_env;

/// Image media types Gemini accepts as inline data.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// A provider backed by the Gemini API.
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "GeminiProvider initialized with models: {:?}, credential: {}",
            config.models,
            config.has_credential()
        );

        Ok(Self { client, config })
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(config_from_env())
    }

    /// Get the configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_request(&self, request: &GenerateRequest) -> GenerateContentRequest {
        let mut parts = vec![Part::text(request.prompt.clone())];
        for part in attachment_parts(&self.config.label, &request.attachments, Some(ACCEPTED_MEDIA_TYPES)) {
            parts.push(match part {
                ContentPart::Image(url) => Part::inline(url.media_type, url.data),
                ContentPart::Text(text) => Part::text(text),
            });
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        }
    }

    fn endpoint(&self, model: &str, stream: bool) -> String {
        if stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", self.config.api_url, model)
        } else {
            format!("{}/models/{}:generateContent", self.config.api_url, model)
        }
    }

    fn post(&self, api_key: &str, model: &str, stream: bool, body: &GenerateContentRequest) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint(model, stream))
            .header("x-goog-api-key", api_key)
            .json(body)
    }
}

/// Normalize one streamed `GenerateContentResponse`.
///
/// Gemini has no end marker; the stream is done when the body ends.
fn parse_stream_frame(_event: &str, data: &str) -> Frame {
    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(response) => {
            if let Some(err) = response.error {
                return Frame::Error(err.message);
            }
            let text = response.text();
            if text.is_empty() {
                Frame::Skip
            } else {
                Frame::Content(text)
            }
        }
        Err(e) => {
            debug!("Skipping unparseable Gemini chunk: {}", e);
            Frame::Skip
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn label(&self) -> &str {
        &self.config.label
    }

    fn list_models(&self) -> Vec<String> {
        self.config.models.clone()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Completion, ProviderError> {
        let api_key = self.config.credential()?;
        let model = request.model_or(self.config.default_model()).to_string();
        let body = self.build_request(&request);

        debug!(
            model = %model,
            attachments = request.attachments.len(),
            "Sending Gemini generateContent request"
        );

        let response = self.post(api_key, &model, false, &body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_response_body(
                &self.config.label,
                status.as_u16(),
                &text,
            ));
        }

        let content: GenerateContentResponse = response.json().await?;

        if let Some(ref usage) = content.usage_metadata {
            debug!(
                "Token usage - prompt: {}, candidates: {}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(Completion::for_request(&request, model, content.text()))
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, ProviderError> {
        let api_key = self.config.credential()?;
        let model = request.model_or(self.config.default_model()).to_string();
        let body = self.build_request(&request);

        debug!(model = %model, "Opening Gemini stream");

        sse::relay(
            &self.config.label,
            self.post(api_key, &model, true, &body),
            request.file_infos(),
            cancel,
            parse_stream_frame,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GEMINI_ENV;
    use provider_core::Attachment;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(ProviderConfig::builder(&GEMINI_ENV).api_key("k").build()).unwrap()
    }

    #[test]
    fn test_build_request() {
        let request = GenerateRequest::new("Resume", "")
            .with_temperature(0.4)
            .with_attachments(vec![
                Attachment::image("1", "a.webp", "data:image/webp;base64,UklG", 3),
                Attachment::image("2", "b.gif", "data:image/gif;base64,R0lG", 3),
                Attachment::document("3", "c.pdf", "texto", 5),
            ]);
        let json = serde_json::to_value(provider().build_request(&request)).unwrap();

        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2000);
        let temperature = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.4).abs() < 1e-6);

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], serde_json::json!({"text": "Resume"}));
        assert_eq!(
            parts[1],
            serde_json::json!({"inlineData": {"mimeType": "image/webp", "data": "UklG"}})
        );
        assert_eq!(parts[2]["text"], "Contenido del PDF \"c.pdf\":\n\ntexto");
    }

    #[test]
    fn test_endpoints() {
        let provider = provider();
        assert_eq!(
            provider.endpoint("gemini-2.0-flash", true),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
        );
        assert!(provider
            .endpoint("gemini-2.0-flash", false)
            .ends_with("/models/gemini-2.0-flash:generateContent"));
    }

    #[test]
    fn test_parse_stream_frame() {
        let chunk = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hola "},{"text":"mundo"}]}}]}"#;
        assert_eq!(parse_stream_frame("", chunk), Frame::Content("Hola mundo".into()));

        let last = r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3}}"#;
        assert_eq!(parse_stream_frame("", last), Frame::Skip);

        let error = r#"{"error":{"code":500,"message":"internal"}}"#;
        assert_eq!(parse_stream_frame("", error), Frame::Error("internal".into()));
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let provider = GeminiProvider::new(ProviderConfig::builder(&GEMINI_ENV).build()).unwrap();
        let err = provider
            .generate_stream(GenerateRequest::new("hi", ""), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "API Key de Gemini no configurada. Por favor, configure GEMINI_API_KEY en el archivo .env"
        );
    }
}
