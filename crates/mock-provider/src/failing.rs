//! Failing provider - every request fails.

use futures::stream::{self, StreamExt};
use provider_core::{
    async_trait, CancellationToken, Completion, EventStream, GenerateRequest, Provider,
    ProviderError, StreamEvent,
};

/// A provider whose requests always fail with a fixed error.
///
/// By default `generate_stream` fails before producing a stream. With
/// [`FailingProvider::in_stream`] it instead returns a stream that
/// yields some content and then a terminal error event.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    id: String,
    error: ProviderError,
    partial: Option<String>,
}

impl FailingProvider {
    /// Create a provider registered under `id` that fails with `error`.
    pub fn new(id: impl Into<String>, error: ProviderError) -> Self {
        Self {
            id: id.into(),
            error,
            partial: None,
        }
    }

    /// Fail mid-stream after emitting `partial` as content.
    pub fn in_stream(mut self, partial: impl Into<String>) -> Self {
        self.partial = Some(partial.into());
        self
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.id
    }

    fn list_models(&self) -> Vec<String> {
        vec![format!("{}-mock", self.id)]
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<Completion, ProviderError> {
        Err(self.error.clone())
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        _cancel: CancellationToken,
    ) -> Result<EventStream, ProviderError> {
        let Some(partial) = &self.partial else {
            return Err(self.error.clone());
        };

        let mut events = Vec::new();
        if !request.attachments.is_empty() {
            events.push(StreamEvent::FilesInfo(request.file_infos()));
        }
        events.push(StreamEvent::Content(partial.clone()));
        events.push(StreamEvent::Error(self.error.to_string()));

        Ok(stream::iter(events).boxed())
    }
}
