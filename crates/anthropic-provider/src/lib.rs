//! Anthropic adapter.
//!
//! Uses the messages API. Images are sent as base64 `image` blocks and
//! only for the media types Anthropic documents; anything else is
//! dropped before the request is built.

mod api_types;
mod config;
mod provider;

pub use config::{config_from_env, ANTHROPIC_ENV};
pub use provider::{AnthropicProvider, ACCEPTED_MEDIA_TYPES, ANTHROPIC_VERSION};
