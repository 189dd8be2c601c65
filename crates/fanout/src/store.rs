//! In-memory attachment store with time-based eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use provider_core::Attachment;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long an attachment stays retrievable by default.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Something attachments can be fetched from by id.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Fetch an attachment. Unknown and expired ids both give `None`.
    async fn get(&self, id: &str) -> Option<Attachment>;
}

struct Entry {
    attachment: Attachment,
    expires_at: Instant,
}

/// Attachments kept in memory for a fixed time after registration.
pub struct AttachmentStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for AttachmentStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl AttachmentStore {
    /// Create a store whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// A fresh random id (UUID v4, hex without dashes).
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `attachment` under its own id and return that id.
    pub async fn insert(&self, attachment: Attachment) -> String {
        let id = attachment.id.clone();
        let expires_at = Instant::now() + self.ttl;
        debug!(id = %id, name = %attachment.display_name, "Storing attachment");
        self.entries.write().await.insert(
            id.clone(),
            Entry {
                attachment,
                expires_at,
            },
        );
        id
    }

    /// Fetch a live attachment.
    pub async fn get(&self, id: &str) -> Option<Attachment> {
        let entries = self.entries.read().await;
        entries
            .get(id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.attachment.clone())
    }

    /// Remove an attachment. Returns whether a live one was removed.
    pub async fn remove(&self, id: &str) -> bool {
        self.entries
            .write()
            .await
            .remove(id)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Drop every expired entry and return how many were dropped.
    pub async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Evicted {} expired attachments", evicted);
        }
        evicted
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run [`AttachmentStore::evict_expired`] every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_eviction(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Attachment eviction stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.evict_expired().await;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl AttachmentSource for AttachmentStore {
    async fn get(&self, id: &str) -> Option<Attachment> {
        AttachmentStore::get(self, id).await
    }
}

/// Fetch every id from `source`, skipping the ones that are gone.
pub async fn resolve_attachments(source: &dyn AttachmentSource, ids: &[String]) -> Vec<Attachment> {
    let mut attachments = Vec::with_capacity(ids.len());
    for id in ids {
        match source.get(id).await {
            Some(attachment) => attachments.push(attachment),
            None => warn!(id = %id, "Attachment not found or expired, skipping"),
        }
    }
    attachments
}
