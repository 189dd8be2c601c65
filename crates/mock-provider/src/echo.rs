//! Echo provider - answers with the prompt.

use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use provider_core::{
    async_trait, CancellationToken, Completion, EventStream, GenerateRequest, Provider,
    ProviderError, StreamEvent,
};

/// A provider that echoes the prompt back.
///
/// Streams split the answer into words, keeping the separating spaces, so
/// concatenating the chunks gives back the full answer. Every request
/// received is recorded for later inspection.
#[derive(Debug, Clone)]
pub struct EchoProvider {
    id: String,
    models: Vec<String>,
    prefix: Option<String>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl EchoProvider {
    /// Create an echo provider registered under `id`, serving `<id>-mock`.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            models: vec![format!("{}-mock", id)],
            id,
            prefix: None,
            requests: Arc::default(),
        }
    }

    /// Replace the model list.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Prefix every answer with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn answer(&self, request: &GenerateRequest) -> String {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, request.prompt),
            None => request.prompt.clone(),
        }
    }
}

/// Split `text` into chunks at word boundaries, keeping whitespace.
fn chunk_words(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(String::from).collect()
}

#[async_trait]
impl Provider for EchoProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.id
    }

    fn list_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Completion, ProviderError> {
        let text = self.answer(&request);
        let model = request.model_or(&self.default_model()).to_string();
        Ok(Completion::for_request(&request, model, text))
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        _cancel: CancellationToken,
    ) -> Result<EventStream, ProviderError> {
        let text = self.answer(&request);

        let mut events = Vec::new();
        if !request.attachments.is_empty() {
            events.push(StreamEvent::FilesInfo(request.file_infos()));
        }
        events.extend(chunk_words(&text).into_iter().map(StreamEvent::Content));
        events.push(StreamEvent::Done);

        Ok(stream::iter(events).boxed())
    }
}
