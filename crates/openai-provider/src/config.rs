//! Configuration for the OpenAI adapter.

use provider_core::{EnvVars, ProviderConfig};

/// Environment variables read by [`config_from_env`].
///
/// - `OPENAI_API_KEY` - credential (required per request)
/// - `OPENAI_API_URL` - base URL (default: https://api.openai.com/v1)
/// - `OPENAI_MODELS` - comma-separated model list, in priority order
/// - `OPENAI_MAX_TOKENS` - completion budget (default: 2000)
pub const OPENAI_ENV: EnvVars = EnvVars {
    label: "OpenAI",
    key_vars: &["OPENAI_API_KEY"],
    placeholder: "your-openai-api-key-here",
    url_var: "OPENAI_API_URL",
    default_url: "https://api.openai.com/v1",
    models_var: "OPENAI_MODELS",
    default_models: &["gpt-4o-mini-2024-07-18", "gpt-3.5-turbo-0125"],
    max_tokens_var: "OPENAI_MAX_TOKENS",
};

/// Read the OpenAI configuration from the environment.
pub fn config_from_env() -> ProviderConfig {
    ProviderConfig::from_env(&OPENAI_ENV)
}
