//! OpenAiProvider implementation using the chat-completions API.

use provider_core::sse::{self, Frame};
use provider_core::{
    async_trait, attachment_parts, CancellationToken, Completion, ContentPart as Part,
    EventStream, GenerateRequest, Provider, ProviderConfig, ProviderError,
};
use reqwest::Client;
use tracing::{debug, info};

use crate::api_types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart,
    MessageContent,
};
use crate::config::config_from_env;

/// Image media types OpenAI accepts inline.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// A provider backed by OpenAI's chat-completions endpoint.
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "OpenAiProvider initialized with models: {:?}, credential: {}",
            config.models,
            config.has_credential()
        );

        Ok(Self { client, config })
    }

    /// Create a provider from environment variables.
    ///
    /// See [`crate::OPENAI_ENV`] for the variables read.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(config_from_env())
    }

    /// Get the configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_request(&self, request: &GenerateRequest, model: &str, stream: bool) -> ChatCompletionRequest {
        let parts = attachment_parts(
            &self.config.label,
            &request.attachments,
            Some(ACCEPTED_MEDIA_TYPES),
        );

        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::user(message_content(&request.prompt, parts, Some("high")))],
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

/// Build chat message content: a bare string for text-only prompts,
/// otherwise the prompt part followed by one part per attachment.
pub fn message_content(prompt: &str, parts: Vec<Part<'_>>, image_detail: Option<&str>) -> MessageContent {
    if parts.is_empty() {
        return MessageContent::Text(prompt.to_string());
    }

    let mut content = Vec::with_capacity(parts.len() + 1);
    content.push(ContentPart::text(prompt));
    for part in parts {
        content.push(match part {
            Part::Image(url) => ContentPart::image(
                format!("data:{};base64,{}", url.media_type, url.data),
                image_detail,
            ),
            Part::Text(text) => ContentPart::text(text),
        });
    }
    MessageContent::Parts(content)
}

/// Normalize one chat-completions stream payload.
///
/// Unparseable payloads are skipped.
pub fn parse_stream_frame(_event: &str, data: &str) -> Frame {
    let data = data.trim();
    if data == "[DONE]" {
        return Frame::Done;
    }
    if data.is_empty() {
        return Frame::Skip;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => {
            if let Some(err) = chunk.error {
                return Frame::Error(err.message);
            }
            match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
                Some(text) if !text.is_empty() => Frame::Content(text),
                _ => Frame::Skip,
            }
        }
        Err(e) => {
            debug!("Skipping unparseable stream payload: {}", e);
            Frame::Skip
        }
    }
}

/// Send a blocking chat-completions request and map the outcome.
pub async fn complete(
    label: &str,
    builder: reqwest::RequestBuilder,
) -> Result<ChatCompletionResponse, ProviderError> {
    let response = builder.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_response_body(label, status.as_u16(), &body));
    }

    let completion: ChatCompletionResponse = response.json().await?;

    if let Some(ref usage) = completion.usage {
        debug!(
            "Token usage - prompt: {}, completion: {}, total: {}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }

    Ok(completion)
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
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
            "Sending OpenAI completion request"
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

        debug!(model = %model, "Opening OpenAI stream");

        sse::relay(
            &self.config.label,
            self.post(api_key, &body),
            request.file_infos(),
            cancel,
            parse_stream_frame,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OPENAI_ENV;
    use provider_core::Attachment;

    fn provider(api_key: Option<&str>) -> OpenAiProvider {
        let mut builder = ProviderConfig::builder(&OPENAI_ENV);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        OpenAiProvider::new(builder.build()).unwrap()
    }

    #[test]
    fn test_provider_identity() {
        let provider = provider(Some("k"));
        assert_eq!(provider.id(), "openai");
        assert_eq!(provider.label(), "OpenAI");
        assert_eq!(
            provider.list_models(),
            vec!["gpt-4o-mini-2024-07-18", "gpt-3.5-turbo-0125"]
        );
        assert_eq!(provider.default_model(), "gpt-4o-mini-2024-07-18");
    }

    #[test]
    fn test_build_request_text_only() {
        let provider = provider(Some("k"));
        let request = GenerateRequest::new("Explain recursion", "").with_temperature(0.2);
        let body = provider.build_request(&request, "gpt-3.5-turbo-0125", false);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo-0125");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["content"], "Explain recursion");
    }

    #[test]
    fn test_build_request_with_attachments() {
        let provider = provider(Some("k"));
        let request = GenerateRequest::new("Describe", "").with_attachments(vec![
            Attachment::image("1", "cat.png", "data:image/png;base64,AAAA", 3),
            Attachment::image("2", "cat.tiff", "data:image/tiff;base64,BBBB", 3),
            Attachment::document("3", "doc.pdf", "hola", 4),
        ]);
        let body = provider.build_request(&request, "gpt-4o-mini-2024-07-18", true);

        let json = serde_json::to_value(&body).unwrap();
        let content = json["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["text"], "Describe");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert_eq!(content[1]["image_url"]["detail"], "high");
        assert_eq!(content[2]["text"], "Contenido del PDF \"doc.pdf\":\n\nhola");
    }

    #[test]
    fn test_parse_stream_frame() {
        assert_eq!(parse_stream_frame("", "[DONE]"), Frame::Done);
        assert_eq!(
            parse_stream_frame("", r#"{"choices":[{"delta":{"content":"Hi"}}]}"#),
            Frame::Content("Hi".into())
        );
        assert_eq!(
            parse_stream_frame("", r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            Frame::Skip
        );
        assert_eq!(parse_stream_frame("", "not json"), Frame::Skip);
        assert_eq!(
            parse_stream_frame("", r#"{"error":{"message":"overloaded","type":"server_error"}}"#),
            Frame::Error("overloaded".into())
        );
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_network() {
        let provider = provider(None);
        let err = provider
            .generate(GenerateRequest::new("hi", ""))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "API Key de OpenAI no configurada. Por favor, configure OPENAI_API_KEY en el archivo .env"
        );

        let err = provider
            .generate_stream(GenerateRequest::new("hi", ""), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.is_credential_missing());
    }

    #[tokio::test]
    async fn test_placeholder_credential_result() {
        let provider = provider(Some("your-openai-api-key-here"));
        let result = provider
            .generate_result(GenerateRequest::new("hi", "gpt-3.5-turbo-0125"))
            .await;
        assert!(!result.success);
        assert_eq!(result.model, "gpt-3.5-turbo-0125");
        assert!(result.error.unwrap().contains("OPENAI_API_KEY"));
    }
}
