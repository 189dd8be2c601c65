//! HTTP gateway for side-by-side LLM comparison.
//!
//! Fans a prompt out to OpenAI, Anthropic, Gemini and xAI Grok, either
//! collecting every answer or streaming them as server-sent events.

mod config;
mod error;
mod routes;
mod sse;
mod state;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use anthropic_provider::AnthropicProvider;
use fanout::{AttachmentStore, Orchestrator, OrchestratorConfig, ProviderRegistry};
use gemini_provider::GeminiProvider;
use grok_provider::GrokProvider;
use openai_provider::OpenAiProvider;
use provider_core::ProviderError;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;
use crate::stats::StatisticsStore;

/// How often expired attachments are swept.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Every provider, configured from the environment.
///
/// A missing API key does not stop the server; the affected branches
/// report the missing credential when used.
fn build_registry() -> Result<ProviderRegistry, ProviderError> {
    Ok(ProviderRegistry::new()
        .with(OpenAiProvider::from_env()?)
        .with(AnthropicProvider::from_env()?)
        .with(GeminiProvider::from_env()?)
        .with(GrokProvider::from_env()?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(
        addr = %config.addr,
        environment = %config.environment,
        production = config.is_production(),
        "Starting API server"
    );

    let orchestrator = Orchestrator::new(build_registry()?, OrchestratorConfig::from_env());

    let shutdown = CancellationToken::new();
    let attachments = Arc::new(AttachmentStore::new(config.attachment_ttl));
    let eviction = attachments.spawn_eviction(EVICTION_INTERVAL, shutdown.clone());

    let stats = Arc::new(StatisticsStore::load(&config.stats_path).await);

    let state = AppState::new(orchestrator, attachments, stats, config.environment.clone());
    let app = routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    eviction.await?;
    info!("API server stopped");

    Ok(())
}
