//! GrokProvider implementation using xAI's chat-completions API.

use openai_provider::api_types::{ChatCompletionRequest, ChatMessage};
use openai_provider::{complete, message_content, parse_stream_frame};
use provider_core::sse;
use provider_core::{
    async_trait, attachment_parts, Attachment, AttachmentKind, CancellationToken, Completion,
    EventStream, GenerateRequest, Provider, ProviderConfig, ProviderError,
};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::config_from_env;

/// Image media types xAI accepts.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Whether `model` takes image input.
pub fn supports_images(model: &str) -> bool {
    model.contains("vision")
}

/// A provider backed by xAI's Grok models.
pub struct GrokProvider {
    client: Client,
    config: ProviderConfig,
}

impl GrokProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "GrokProvider initialized with models: {:?}, credential: {}",
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

    fn build_request(&self, request: &GenerateRequest, model: &str, stream: bool) -> ChatCompletionRequest {
        let attachments: Vec<Attachment> = if supports_images(model) {
            request.attachments.clone()
        } else {
            request
                .attachments
                .iter()
                .filter(|attachment| {
                    let keep = attachment.kind != AttachmentKind::Image;
                    if !keep {
                        warn!(
                            file = %attachment.display_name,
                            model,
                            "Model does not support image analysis, dropping image"
                        );
                    }
                    keep
                })
                .cloned()
                .collect()
        };

        let parts = attachment_parts(&self.config.label, &attachments, Some(ACCEPTED_MEDIA_TYPES));

        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::user(message_content(&request.prompt, parts, None))],
            max_tokens: self.config.max_tokens,
            temperature: request.temperature,
            stream,
        }
    }

    fn post(&self, api_key: &str, body: &ChatCompletionRequest) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/chat/completions", self.config.api_url))
            .bearer_auth(api_key)
            .json(body)
    }
}

#[async_trait]
impl Provider for GrokProvider {
    fn id(&self) -> &str {
        "grok"
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
        let body = self.build_request(&request, &model, false);

        debug!(
            model = %model,
            attachments = request.attachments.len(),
            "Sending xAI completion request"
        );

        let completion = complete(&self.config.label, self.post(api_key, &body)).await?;
        let text = completion.first_content().unwrap_or_default();

        Ok(Completion::for_request(&request, model, text))
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, ProviderError> {
        let api_key = self.config.credential()?;
        let model = request.model_or(self.config.default_model()).to_string();
        let body = self.build_request(&request, &model, true);

        debug!(model = %model, "Opening xAI stream");

        sse::relay(
            &self.config.label,
            self.post(api_key, &body),
            request.file_infos(),
            cancel,
            parse_stream_frame,
        )
    }
}
