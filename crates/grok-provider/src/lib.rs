//! xAI Grok adapter.
//!
//! xAI speaks the OpenAI chat-completions dialect, so this crate reuses
//! the wire types and stream parser from `openai-provider`. The Grok
//! specifics are the credential variables and that images are only sent
//! to vision models.

mod config;
mod provider;

pub use config::{config_from_env, GROK_ENV};
pub use provider::{supports_images, GrokProvider, ACCEPTED_MEDIA_TYPES};
