//! Fan-out orchestrator: plans branches, runs them concurrently and merges
//! their output.

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{Stream, StreamExt};
use futures::FutureExt;
use provider_core::{
    Attachment, EventStream, FileInfo, GenerateRequest, Provider, ProviderResult, StreamEvent,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::FanoutError;
use crate::event::TokenEvent;
use crate::gate::gate_attachments;
use crate::registry::ProviderRegistry;
use crate::selection::{resolve_model, BranchSelection};

/// A prompt to run against several branches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanoutRequest {
    pub prompt: String,
    pub selections: Vec<BranchSelection>,
    /// Attachments offered to every branch, before gating.
    pub attachments: Vec<Attachment>,
}

impl FanoutRequest {
    pub fn new(prompt: impl Into<String>, selections: Vec<BranchSelection>) -> Self {
        Self {
            prompt: prompt.into(),
            selections,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Everything decided about a branch before it runs.
struct BranchPlan {
    index: usize,
    provider: Arc<dyn Provider>,
    provider_id: String,
    model: String,
    substituted_for: Option<String>,
    temperature: f32,
    approved: Vec<Attachment>,
    warnings: Vec<String>,
}

impl BranchPlan {
    fn request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest::new(prompt, self.model.clone())
            .with_temperature(self.temperature)
            .with_attachments(self.approved.clone())
    }
}

/// Lifecycle of a streaming branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Pending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

/// Outcome of one branch of [`Orchestrator::generate_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchResult {
    pub provider: String,
    pub success: bool,
    /// The answer, or the error message for a failed branch.
    pub response: String,
    pub model: String,
    pub temperature: f32,
    pub files_processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_files: Option<Vec<FileInfo>>,
    /// Set when a different model than requested was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BranchResult {
    fn from_plan(plan: &BranchPlan, offered: &[Attachment], result: ProviderResult) -> Self {
        let file_warnings = if plan.warnings.is_empty() {
            None
        } else {
            Some(plan.warnings.clone())
        };

        if result.success {
            return Self {
                provider: plan.provider_id.clone(),
                success: true,
                response: result.response.unwrap_or_default(),
                model: result.model,
                temperature: result.temperature,
                files_processed: !plan.approved.is_empty(),
                file_warnings,
                attached_files: result.attached_files,
                requested_model: plan.substituted_for.clone(),
                error: None,
            };
        }

        let message = result
            .error
            .unwrap_or_else(|| "Error desconocido".to_string());
        let attached_files = if offered.is_empty() {
            None
        } else {
            Some(offered.iter().map(Attachment::file_info).collect())
        };

        Self {
            provider: plan.provider_id.clone(),
            success: false,
            response: message.clone(),
            model: plan.model.clone(),
            temperature: plan.temperature,
            files_processed: false,
            file_warnings,
            attached_files,
            requested_model: plan.substituted_for.clone(),
            error: Some(message),
        }
    }
}

/// The merged event stream of a fan-out request.
///
/// Dropping it cancels every branch. Once the request's token is
/// cancelled the stream ends immediately, even if events are buffered.
pub struct TokenStream {
    rx: mpsc::Receiver<TokenEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl TokenStream {
    /// The token controlling this stream's branches.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Stream for TokenStream {
    type Item = TokenEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Coordinates branches across registered providers.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over `registry`.
    pub fn new(registry: ProviderRegistry, config: OrchestratorConfig) -> Self {
        info!(
            "Orchestrator initialized with providers {:?}, auto_substitute: {}, idle_timeout: {:?}",
            registry.ids(),
            config.auto_substitute_models,
            config.idle_timeout
        );
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate the request and decide model and attachments per branch.
    fn plan(&self, request: &FanoutRequest) -> Result<Vec<BranchPlan>, FanoutError> {
        if request.prompt.trim().is_empty() {
            return Err(FanoutError::MissingPrompt);
        }
        if request.selections.is_empty() {
            return Err(FanoutError::NoSelections);
        }

        let mut plans = Vec::with_capacity(request.selections.len());

        for (index, selection) in request.selections.iter().enumerate() {
            let provider = self.registry.get(&selection.provider).ok_or_else(|| {
                FanoutError::UnknownProvider {
                    provider: selection.provider.clone(),
                    expected: self.registry.describe(),
                }
            })?;

            let temperature = selection.effective_temperature();
            if !(0.0..=1.0).contains(&temperature) {
                return Err(FanoutError::InvalidTemperature {
                    provider: selection.provider.clone(),
                    value: temperature,
                });
            }

            let resolved = resolve_model(
                provider.as_ref(),
                selection.requested_model(),
                &request.attachments,
                self.config.auto_substitute_models,
            );
            let gate = gate_attachments(&resolved.model, &request.attachments);

            debug!(
                branch = index,
                provider = %selection.provider,
                model = %resolved.model,
                approved = gate.approved.len(),
                rejected = gate.warnings.len(),
                "Planned branch"
            );

            plans.push(BranchPlan {
                index,
                provider_id: selection.provider.clone(),
                provider,
                model: resolved.model,
                substituted_for: resolved.substituted_for,
                temperature,
                approved: gate.approved,
                warnings: gate.warnings,
            });
        }

        Ok(plans)
    }

    /// Start every branch and return the merged stream.
    ///
    /// Validation errors are returned before anything starts. After that
    /// the stream carries each branch's events tagged with its index, then
    /// a single `AllDone` once every branch has finished or failed. If
    /// `cancel` fires, or the stream is dropped, all branches stop and no
    /// `AllDone` is sent.
    pub fn stream(&self, request: FanoutRequest, cancel: CancellationToken) -> Result<TokenStream, FanoutError> {
        let plans = self.plan(&request)?;
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        info!(
            branches = plans.len(),
            attachments = request.attachments.len(),
            "Starting fan-out stream"
        );

        tokio::spawn(supervise(
            plans,
            Arc::from(request.prompt),
            tx,
            cancel.clone(),
            self.config.idle_timeout,
        ));

        Ok(TokenStream {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        })
    }

    /// Run every branch to completion and collect one result per
    /// selection, in selection order. Branch failures are reported in
    /// their result and never fail the call.
    pub async fn generate_all(&self, request: &FanoutRequest) -> Result<Vec<BranchResult>, FanoutError> {
        let plans = self.plan(request)?;

        info!(branches = plans.len(), "Running synchronous fan-out");

        let runs = plans.iter().map(|plan| async move {
            let result = plan.provider.generate_result(plan.request(&request.prompt)).await;
            if let Some(ref err) = result.error {
                warn!(branch = plan.index, provider = %plan.provider_id, "Branch failed: {}", err);
            }
            BranchResult::from_plan(plan, &request.attachments, result)
        });

        Ok(join_all(runs).await)
    }
}

/// Run every branch, then send `AllDone` unless cancelled.
async fn supervise(
    plans: Vec<BranchPlan>,
    prompt: Arc<str>,
    tx: mpsc::Sender<TokenEvent>,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
) {
    let mut branches = JoinSet::new();

    for plan in plans {
        let (index, provider_id) = (plan.index, plan.provider_id.clone());
        let tx = tx.clone();
        let cancel = cancel.clone();
        let prompt = Arc::clone(&prompt);

        branches.spawn(async move {
            let outcome = AssertUnwindSafe(run_branch(plan, prompt, tx.clone(), cancel.clone(), idle_timeout))
                .catch_unwind()
                .await;

            match outcome {
                Ok(state) => state,
                Err(_) => {
                    error!(branch = index, provider = %provider_id, "Branch panicked");
                    let event = TokenEvent::BranchError {
                        branch: index,
                        provider: provider_id,
                        message: "Error interno del servidor".to_string(),
                    };
                    forward(&tx, &cancel, event).await;
                    BranchState::Failed
                }
            }
        });
    }

    let mut completed = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = branches.join_next().await {
        match joined {
            Ok(BranchState::Completed) => completed += 1,
            Ok(BranchState::Failed) => failed += 1,
            Ok(_) => {}
            Err(e) => error!("Branch task failed to join: {}", e),
        }
    }

    if cancel.is_cancelled() {
        info!(completed, failed, "Fan-out cancelled, no completion event sent");
        return;
    }

    info!(completed, failed, "All branches finished");
    forward(&tx, &cancel, TokenEvent::AllDone).await;
}

/// Send `event` unless the request is cancelled. A closed receiver means
/// the client went away, which cancels the request.
async fn forward(tx: &mpsc::Sender<TokenEvent>, cancel: &CancellationToken, event: TokenEvent) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => {
            if sent.is_err() {
                debug!("Receiver dropped, cancelling fan-out");
                cancel.cancel();
                return false;
            }
            true
        }
    }
}

async fn next_event(stream: &mut EventStream, idle_timeout: Option<Duration>) -> Result<Option<StreamEvent>, Duration> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| limit),
        None => Ok(stream.next().await),
    }
}

/// Drive one branch from its informational events to a terminal event.
async fn run_branch(
    plan: BranchPlan,
    prompt: Arc<str>,
    tx: mpsc::Sender<TokenEvent>,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
) -> BranchState {
    let branch = plan.index;
    let provider = plan.provider_id.clone();
    let mut state = BranchState::Pending;

    if let Some(requested) = &plan.substituted_for {
        let event = TokenEvent::ModelSubstituted {
            branch,
            provider: provider.clone(),
            requested: requested.clone(),
            model: plan.model.clone(),
        };
        if !forward(&tx, &cancel, event).await {
            return BranchState::Cancelled;
        }
    }

    for message in &plan.warnings {
        let event = TokenEvent::AttachmentWarning {
            branch,
            provider: provider.clone(),
            message: message.clone(),
        };
        if !forward(&tx, &cancel, event).await {
            return BranchState::Cancelled;
        }
    }

    let request = plan.request(&prompt);
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return BranchState::Cancelled,
        opened = plan.provider.generate_stream(request, cancel.clone()) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(err) => {
            warn!(branch, provider = %provider, "Branch failed to start: {}", err);
            let event = TokenEvent::BranchError {
                branch,
                provider,
                message: err.to_string(),
            };
            forward(&tx, &cancel, event).await;
            return BranchState::Failed;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = next_event(&mut stream, idle_timeout) => Some(next),
        };

        let Some(next) = next else {
            debug!(branch, provider = %provider, ?state, "Branch cancelled");
            return BranchState::Cancelled;
        };

        let (event, terminal) = match next {
            Err(limit) => {
                warn!(branch, provider = %provider, "Branch idle for {:?}, giving up", limit);
                let message = format!(
                    "Tiempo de espera agotado: {} no respondió en {} segundos",
                    plan.provider.label(),
                    limit.as_secs()
                );
                (
                    TokenEvent::BranchError {
                        branch,
                        provider: provider.clone(),
                        message,
                    },
                    BranchState::Failed,
                )
            }
            Ok(Some(StreamEvent::FilesInfo(files))) => (
                TokenEvent::FilesInfo {
                    branch,
                    provider: provider.clone(),
                    files,
                },
                BranchState::Streaming,
            ),
            Ok(Some(StreamEvent::Content(text))) => (
                TokenEvent::Content {
                    branch,
                    provider: provider.clone(),
                    text,
                },
                BranchState::Streaming,
            ),
            Ok(Some(StreamEvent::Error(message))) => {
                warn!(branch, provider = %provider, "Branch failed: {}", message);
                (
                    TokenEvent::BranchError {
                        branch,
                        provider: provider.clone(),
                        message,
                    },
                    BranchState::Failed,
                )
            }
            Ok(Some(StreamEvent::Done)) | Ok(None) => {
                if cancel.is_cancelled() {
                    return BranchState::Cancelled;
                }
                (
                    TokenEvent::BranchDone {
                        branch,
                        provider: provider.clone(),
                        model: plan.model.clone(),
                        temperature: plan.temperature,
                    },
                    BranchState::Completed,
                )
            }
        };

        state = terminal;
        if !forward(&tx, &cancel, event).await {
            return BranchState::Cancelled;
        }
        if matches!(state, BranchState::Completed | BranchState::Failed) {
            debug!(branch, provider = %provider, ?state, "Branch finished");
            return state;
        }
    }
}
