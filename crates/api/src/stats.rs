//! Persisted prompt counter.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Snapshot of the counter, also its on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default)]
    pub prompt_count: u64,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Statistics {
    fn zero() -> Self {
        Self {
            prompt_count: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Counts accepted generation requests and persists the count as JSON.
///
/// Write failures while counting are logged and otherwise ignored; the
/// in-memory count stays authoritative for the life of the process. A
/// reset reports them to the caller.
pub struct StatisticsStore {
    path: PathBuf,
    stats: Mutex<Statistics>,
}

impl StatisticsStore {
    /// Load the counter from `path`. A missing or unreadable file starts
    /// from zero.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let stats = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Statistics>(&raw) {
                Ok(stats) => {
                    info!(path = %path.display(), count = stats.prompt_count, "Loaded statistics");
                    stats
                }
                Err(e) => {
                    warn!(path = %path.display(), "Corrupt statistics file, starting from zero: {}", e);
                    Statistics::zero()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No statistics file yet");
                Statistics::zero()
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to read statistics, starting from zero: {}", e);
                Statistics::zero()
            }
        };

        Self {
            path,
            stats: Mutex::new(stats),
        }
    }

    /// Current counter value.
    pub async fn snapshot(&self) -> Statistics {
        self.stats.lock().await.clone()
    }

    /// Count one prompt and persist.
    pub async fn increment(&self) -> Statistics {
        let mut stats = self.stats.lock().await;
        stats.prompt_count += 1;
        stats.last_updated = Utc::now();
        self.save(&stats).await;
        stats.clone()
    }

    /// Reset the counter to zero and persist.
    pub async fn reset(&self) -> std::io::Result<Statistics> {
        let mut stats = self.stats.lock().await;
        *stats = Statistics::zero();
        self.write(&stats).await?;
        info!("Statistics reset");
        Ok(stats.clone())
    }

    async fn save(&self, stats: &Statistics) {
        if let Err(e) = self.write(stats).await {
            warn!(path = %self.path.display(), "Failed to save statistics: {}", e);
        }
    }

    async fn write(&self, stats: &Statistics) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(stats)?;
        tokio::fs::write(&self.path, json).await
    }
}
