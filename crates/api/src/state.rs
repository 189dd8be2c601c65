//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use fanout::{AttachmentStore, Orchestrator};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stats::StatisticsStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub attachments: Arc<AttachmentStore>,
    pub stats: Arc<StatisticsStore>,
    pub streams: ActiveStreams,
    /// Deployment environment reported by the health check.
    pub environment: String,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        orchestrator: Orchestrator,
        attachments: Arc<AttachmentStore>,
        stats: Arc<StatisticsStore>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            attachments,
            stats,
            streams: ActiveStreams::default(),
            environment: environment.into(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Cancellation tokens of the streams currently in flight, by request id.
#[derive(Clone, Default)]
pub struct ActiveStreams {
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ActiveStreams {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track `token` under `id` until the returned guard is dropped.
    pub fn register(&self, id: impl Into<String>, token: CancellationToken) -> Registration {
        let id = id.into();
        self.lock().insert(id.clone(), token);
        Registration {
            streams: self.clone(),
            id,
        }
    }

    /// Cancel the stream registered under `id`. Returns false if unknown.
    pub fn cancel(&self, id: &str) -> bool {
        match self.lock().remove(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }
}

/// Removes a stream from [`ActiveStreams`] when dropped.
pub struct Registration {
    streams: ActiveStreams,
    id: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        debug!(request_id = %self.id, "Stream finished");
        self.streams.lock().remove(&self.id);
    }
}
