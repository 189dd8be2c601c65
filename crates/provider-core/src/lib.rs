//! Core trait and types for LLM provider adapters.
//!
//! This crate defines the [`Provider`] trait that every vendor adapter
//! implements, the request/response types that flow through it, the
//! per-model [capability gate](capabilities), and the SSE relay the
//! streaming adapters share.
//!
//! # Example
//!
//! ```rust,ignore
//! use provider_core::{GenerateRequest, Provider};
//!
//! async fn ask(provider: &dyn Provider) -> String {
//!     let request = GenerateRequest::new("Explain recursion", "");
//!     provider.generate_result(request).await.display_text().to_string()
//! }
//! ```

pub mod attachment;
pub mod capabilities;
mod config;
mod error;
mod event;
mod provider;
mod request;
mod result;
pub mod sse;

pub use attachment::{
    parse_data_url, Attachment, AttachmentKind, DataUrl, FileInfo, PDF_MEDIA_TYPE,
};
pub use capabilities::{can_process, Admission, ModelCapabilities};
pub use config::{EnvVars, ProviderConfig, ProviderConfigBuilder};
pub use error::ProviderError;
pub use event::{EventStream, StreamEvent};
pub use provider::Provider;
pub use request::{
    attachment_parts, document_text_part, ContentPart, GenerateRequest, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
pub use result::{Completion, ProviderResult};

// Re-export so implementors don't need direct dependencies.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
