//! Configuration for the Gemini adapter.

use provider_core::{EnvVars, ProviderConfig};

/// Environment variables read by [`config_from_env`].
///
/// - `GEMINI_API_KEY` - credential
/// - `GEMINI_API_URL` - base URL (default: https://generativelanguage.googleapis.com/v1beta)
/// - `GEMINI_MODELS` - comma-separated model list
/// - `GEMINI_MAX_TOKENS` - completion budget (default: 2000)
pub const GEMINI_ENV: EnvVars = EnvVars {
    label: "Gemini",
    key_vars: &["GEMINI_API_KEY"],
    placeholder: "your-gemini-api-key-here",
    url_var: "GEMINI_API_URL",
    default_url: "https://generativelanguage.googleapis.com/v1beta",
    models_var: "GEMINI_MODELS",
    default_models: &["gemini-2.0-flash-lite", "gemini-2.0-flash"],
    max_tokens_var: "GEMINI_MAX_TOKENS",
};

/// Read the Gemini configuration from the environment.
pub fn config_from_env() -> ProviderConfig {
    ProviderConfig::from_env(&GEMINI_ENV)
}
