//! Prompt counter endpoints.

use axum::extract::State;
use axum::Json;

use crate::error::{ApiError, Result};
use crate::routes::{done, Envelope};
use crate::state::AppState;
use crate::stats::Statistics;

/// Read the prompt counter.
pub async fn get_statistics(State(state): State<AppState>) -> Json<Envelope<Statistics>> {
    Envelope::ok(state.stats.snapshot().await)
}

/// Reset the prompt counter. Refused in production.
pub async fn reset_statistics(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    if state.is_production() {
        tracing::warn!("Refused statistics reset in production");
        return Err(ApiError::Forbidden);
    }

    state
        .stats
        .reset()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to persist statistics reset: {}", e)))?;
    Ok(done("Estadísticas reiniciadas"))
}
