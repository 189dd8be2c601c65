//! Configuration for the Grok adapter.

use provider_core::{EnvVars, ProviderConfig};

/// Environment variables read by [`config_from_env`].
///
/// - `GROK_API_KEY` or `XAI_API_KEY` - credential
/// - `GROK_API_URL` - base URL (default: https://api.x.ai/v1)
/// - `GROK_MODELS` - comma-separated model list
/// - `GROK_MAX_TOKENS` - completion budget (default: 2000)
pub const GROK_ENV: EnvVars = EnvVars {
    label: "xAI",
    key_vars: &["GROK_API_KEY", "XAI_API_KEY"],
    placeholder: "your-xai-api-key-here",
    url_var: "GROK_API_URL",
    default_url: "https://api.x.ai/v1",
    models_var: "GROK_MODELS",
    default_models: &["grok-3-mini-fast", "grok-2-vision-1212"],
    max_tokens_var: "GROK_MAX_TOKENS",
};

/// Read the Grok configuration from the environment.
pub fn config_from_env() -> ProviderConfig {
    ProviderConfig::from_env(&GROK_ENV)
}

#[cfg(test)]
mod tests {
    use super::*;

    // XAI_API_KEY is only a fallback; GROK_API_KEY wins when both are set.
    #[test]
    fn test_from_env_key_fallback() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        std::env::remove_var("GROK_API_KEY");
        std::env::set_var("XAI_API_KEY", "xai-key");
        assert_eq!(config_from_env().credential().unwrap(), "xai-key");

        std::env::set_var("GROK_API_KEY", "grok-key");
        assert_eq!(config_from_env().credential().unwrap(), "grok-key");

        std::env::remove_var("GROK_API_KEY");
        std::env::remove_var("XAI_API_KEY");
        let err = config_from_env().credential().unwrap_err();
        assert_eq!(
            err.to_string(),
            "API Key de xAI no configurada. Por favor, configure GROK_API_KEY en el archivo .env"
        );
    }
}
