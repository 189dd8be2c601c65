//! Delayed provider - wraps another provider with artificial latency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use provider_core::{
    async_trait, CancellationToken, Completion, EventStream, GenerateRequest, Provider,
    ProviderError,
};
use tokio::time::sleep;
use tracing::debug;

/// A provider that wraps another provider and delays each stream event.
///
/// Its streams honour the cancellation token the way a real adapter does:
/// once cancelled they end without a terminal event. A stream that is
/// cancelled, or dropped before its terminal event, counts as an abort,
/// see [`DelayedProvider::aborts`].
pub struct DelayedProvider<P: Provider> {
    inner: Arc<P>,
    delay: Duration,
    aborts: Arc<AtomicUsize>,
}

impl<P: Provider + 'static> DelayedProvider<P> {
    /// Wrap `inner`, waiting `delay` before each event.
    pub fn new(inner: P, delay: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            delay,
            aborts: Arc::default(),
        }
    }

    /// Create a provider with a delay in milliseconds.
    pub fn with_millis(inner: P, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    /// How many streams were abandoned before finishing.
    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    /// Shared handle to the abort counter.
    pub fn abort_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.aborts)
    }
}

struct Delayed {
    inner: EventStream,
    delay: Duration,
    cancel: CancellationToken,
    aborts: Arc<AtomicUsize>,
    finished: bool,
}

impl Drop for Delayed {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Delayed stream aborted");
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<P: Provider + 'static> Provider for DelayedProvider<P> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn label(&self) -> &str {
        self.inner.label()
    }

    fn list_models(&self) -> Vec<String> {
        self.inner.list_models()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Completion, ProviderError> {
        sleep(self.delay).await;
        self.inner.generate(request).await
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, ProviderError> {
        let inner = self.inner.generate_stream(request, cancel.clone()).await?;

        let state = Some(Delayed {
            inner,
            delay: self.delay,
            cancel,
            aborts: Arc::clone(&self.aborts),
            finished: false,
        });

        let stream = stream::unfold(state, |state| async move {
            let mut state = state?;

            let cancelled = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => true,
                _ = sleep(state.delay) => false,
            };

            if cancelled {
                return None;
            }

            match state.inner.next().await {
                Some(event) => {
                    state.finished |= event.is_terminal();
                    Some((event, Some(state)))
                }
                None => {
                    state.finished = true;
                    None
                }
            }
        });

        Ok(stream.boxed())
    }
}
