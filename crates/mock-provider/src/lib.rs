//! Mock provider implementations for tests.
//!
//! - `EchoProvider` - answers with the prompt, streamed word by word
//! - `FailingProvider` - always fails, either up front or in-stream
//! - `DelayedProvider` - wraps another provider, delaying every event
//!   and counting how often its stream was cancelled
//!
//! # Example
//!
//! ```rust
//! use mock_provider::{EchoProvider, GenerateRequest, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_provider::ProviderError> {
//!     let provider = EchoProvider::new("openai");
//!     let completion = provider.generate(GenerateRequest::new("Hello!", "")).await?;
//!     assert_eq!(completion.text, "Hello!");
//!     Ok(())
//! }
//! ```

mod delayed;
mod echo;
mod failing;

pub use provider_core::{
    async_trait, Attachment, CancellationToken, Completion, EventStream, GenerateRequest, Provider,
    ProviderError, StreamEvent,
};

pub use delayed::DelayedProvider;
pub use echo::EchoProvider;
pub use failing::FailingProvider;
