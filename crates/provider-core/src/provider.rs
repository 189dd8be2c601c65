//! The Provider trait definition.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::event::EventStream;
use crate::request::GenerateRequest;
use crate::result::{Completion, ProviderResult};

/// An LLM backend that can answer a prompt, either all at once or as a
/// stream of chunks.
///
/// Implementations own their HTTP client and vendor payload format. The
/// trait is object-safe and is normally used as `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier, e.g. `openai`.
    fn id(&self) -> &str;

    /// Human-readable vendor name used in messages, e.g. `OpenAI`.
    fn label(&self) -> &str;

    /// Models this provider serves, in priority order.
    fn list_models(&self) -> Vec<String>;

    /// The model used when a request does not name one.
    fn default_model(&self) -> String {
        self.list_models().into_iter().next().unwrap_or_default()
    }

    /// Generate a complete response.
    async fn generate(&self, request: GenerateRequest) -> Result<Completion, ProviderError>;

    /// Start a streaming generation.
    ///
    /// Errors returned here mean no stream was opened. Once a stream is
    /// returned, failures arrive as a terminal `StreamEvent::Error`. When
    /// `cancel` fires the stream ends without a terminal event and the
    /// upstream connection is dropped.
    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, ProviderError>;

    /// Generate and fold the outcome into a [`ProviderResult`].
    async fn generate_result(&self, request: GenerateRequest) -> ProviderResult {
        let default_model = self.default_model();
        let outcome = self.generate(request.clone()).await;
        ProviderResult::from_outcome(&request, &default_model, outcome)
    }
}
