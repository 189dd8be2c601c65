//! Fan-out orchestration across LLM providers.
//!
//! An [`Orchestrator`] takes one prompt and a list of branch selections,
//! resolves a model and gates attachments for each branch, then runs the
//! branches concurrently. Streaming output is merged into a single
//! [`TokenStream`] of branch-tagged [`TokenEvent`]s that ends with exactly
//! one `AllDone`, unless the request is cancelled first.
//!
//! # Example
//!
//! ```rust,ignore
//! use fanout::{BranchSelection, FanoutRequest, Orchestrator, OrchestratorConfig, ProviderRegistry};
//! use futures::StreamExt;
//!
//! let orchestrator = Orchestrator::new(registry, OrchestratorConfig::from_env());
//! let request = FanoutRequest::new(
//!     "Explain recursion",
//!     vec![BranchSelection::new("openai"), BranchSelection::new("anthropic")],
//! );
//! let mut events = orchestrator.stream(request, CancellationToken::new())?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event);
//! }
//! ```

mod config;
mod error;
mod event;
pub mod gate;
mod orchestrator;
mod registry;
mod selection;
pub mod store;

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder, DEFAULT_CHANNEL_CAPACITY};
pub use error::FanoutError;
pub use event::TokenEvent;
pub use gate::{admits_all, gate_attachments, GateOutcome};
pub use orchestrator::{BranchResult, BranchState, FanoutRequest, Orchestrator, TokenStream};
pub use registry::ProviderRegistry;
pub use selection::{resolve_model, BranchSelection, ResolvedModel};
pub use store::{resolve_attachments, AttachmentSource, AttachmentStore, DEFAULT_TTL};
