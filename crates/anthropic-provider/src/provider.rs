//! AnthropicProvider implementation using the messages API.

use provider_core::sse::{self, Frame};
use provider_core::{
    async_trait, attachment_parts, CancellationToken, Completion, ContentPart, EventStream,
    GenerateRequest, Provider, ProviderConfig, ProviderError,
};
use reqwest::Client;
use tracing::{debug, info};

use crate::api_types::{
    ContentBlock, ImageSource, Message, MessageContent, MessagesRequest, MessagesResponse,
    StreamPayload,
};
use crate::config::config_from_env;

/// Image media types Anthropic accepts.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Value of the `anthropic-version` header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A provider backed by Anthropic's messages endpoint.
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "AnthropicProvider initialized with models: {:?}, credential: {}",
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

    fn build_request(&self, request: &GenerateRequest, model: &str, stream: bool) -> MessagesRequest {
        let parts = attachment_parts(
            &self.config.label,
            &request.attachments,
            Some(ACCEPTED_MEDIA_TYPES),
        );

        let content = if parts.is_empty() {
            MessageContent::Text(request.prompt.clone())
        } else {
            let mut blocks = vec![ContentBlock::Text {
                text: request.prompt.clone(),
            }];
            blocks.extend(parts.into_iter().map(|part| match part {
                ContentPart::Image(url) => ContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: url.media_type.to_string(),
                        data: url.data.to_string(),
                    },
                },
                ContentPart::Text(text) => ContentBlock::Text { text },
            }));
            MessageContent::Blocks(blocks)
        };

        MessagesRequest {
            model: model.to_string(),
            max_tokens: self.config.max_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
            stream,
        }
    }

    fn post(&self, api_key: &str, body: &MessagesRequest) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/messages", self.config.api_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }
}

/// Normalize one messages-API stream event.
fn parse_stream_frame(event: &str, data: &str) -> Frame {
    match event {
        "message_stop" => Frame::Done,
        "content_block_delta" | "error" => match serde_json::from_str::<StreamPayload>(data) {
            Ok(StreamPayload {
                error: Some(err), ..
            }) => Frame::Error(err.message),
            Ok(StreamPayload {
                delta: Some(delta), ..
            }) if delta.delta_type.as_deref() == Some("text_delta") => match delta.text {
                Some(text) if !text.is_empty() => Frame::Content(text),
                _ => Frame::Skip,
            },
            Ok(_) => Frame::Skip,
            Err(e) => {
                debug!("Skipping unparseable Anthropic event: {}", e);
                Frame::Skip
            }
        },
        _ => Frame::Skip,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
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
            "Sending Anthropic messages request"
        );

        let response = self.post(api_key, &body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_response_body(
                &self.config.label,
                status.as_u16(),
                &text,
            ));
        }

        let message: MessagesResponse = response.json().await?;

        if let Some(ref usage) = message.usage {
            debug!(
                "Token usage - input: {}, output: {}",
                usage.input_tokens, usage.output_tokens
            );
        }

        Ok(Completion::for_request(&request, model, message.text()))
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, ProviderError> {
        let api_key = self.config.credential()?;
        let model = request.model_or(self.config.default_model()).to_string();
        let body = self.build_request(&request, &model, true);

        debug!(model = %model, "Opening Anthropic stream");

        sse::relay(
            &self.config.label,
            self.post(api_key, &body),
            request.file_infos(),
            cancel,
            parse_stream_frame,
        )
    }
}
