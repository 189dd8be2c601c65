//! OpenAI adapter.
//!
//! Talks to the chat-completions endpoint, both blocking and streaming.
//! The wire types in [`api_types`] are also spoken by other
//! OpenAI-compatible vendors and are public so their adapters can reuse
//! them.
//!
//! ```rust,no_run
//! use openai_provider::OpenAiProvider;
//! use provider_core::{GenerateRequest, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAiProvider::from_env()?;
//!     let completion = provider.generate(GenerateRequest::new("Hola", "")).await?;
//!     println!("{}", completion.text);
//!     Ok(())
//! }
//! ```

pub mod api_types;
mod config;
mod provider;

pub use config::{config_from_env, OPENAI_ENV};
pub use provider::{complete, message_content, parse_stream_frame, OpenAiProvider, ACCEPTED_MEDIA_TYPES};
