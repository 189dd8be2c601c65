//! Google Gemini adapter.
//!
//! Calls `generateContent` for blocking requests and
//! `streamGenerateContent?alt=sse` for streaming ones. Images travel as
//! `inlineData` parts.

mod api_types;
mod config;
mod provider;

pub use config::{config_from_env, GEMINI_ENV};
pub use provider::{GeminiProvider, ACCEPTED_MEDIA_TYPES};
