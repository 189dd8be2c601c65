//! Configuration for the Anthropic adapter.

use provider_core::{EnvVars, ProviderConfig};

/// Environment variables read by [`config_from_env`].
///
/// - `ANTHROPIC_API_KEY` - credential
/// - `ANTHROPIC_API_URL` - base URL (default: https://api.anthropic.com/v1)
/// - `ANTHROPIC_MODELS` - comma-separated model list
/// - `ANTHROPIC_MAX_TOKENS` - completion budget (default: 2000)
pub const ANTHROPIC_ENV: EnvVars = EnvVars {
    label: "Anthropic",
    key_vars: &["ANTHROPIC_API_KEY"],
    placeholder: "your-anthropic-api-key-here",
    url_var: "ANTHROPIC_API_URL",
    default_url: "https://api.anthropic.com/v1",
    models_var: "ANTHROPIC_MODELS",
    default_models: &["claude-3-5-haiku-latest", "claude-3-5-sonnet-20240620"],
    max_tokens_var: "ANTHROPIC_MAX_TOKENS",
};

/// Read the Anthropic configuration from the environment.
pub fn config_from_env() -> ProviderConfig {
    ProviderConfig::from_env(&ANTHROPIC_ENV)
}
