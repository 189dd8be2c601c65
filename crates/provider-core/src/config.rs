//! Environment-driven configuration shared by the provider adapters.

use std::env;

use crate::error::ProviderError;
use crate::request::DEFAULT_MAX_TOKENS;

/// Where an adapter finds its settings.
///
/// Each adapter declares one of these as a `const` and hands it to
/// [`ProviderConfig::from_env`].
#[derive(Debug, Clone, Copy)]
pub struct EnvVars {
    /// Vendor name used in messages, e.g. `OpenAI`.
    pub label: &'static str,
    /// Credential variables, checked in order. The first one is the one
    /// named in error messages.
    pub key_vars: &'static [&'static str],
    /// Example value shipped in `.env.example`; treated as unset.
    pub placeholder: &'static str,
    pub url_var: &'static str,
    pub default_url: &'static str,
    /// Comma-separated model override.
    pub models_var: &'static str,
    pub default_models: &'static [&'static str],
    pub max_tokens_var: &'static str,
}

/// Resolved adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub label: String,
    /// Variable named in the "credential missing" message.
    pub credential_var: String,
    /// Credential, if any was configured.
    pub api_key: Option<String>,
    pub placeholder: String,
    pub api_url: String,
    /// Models in priority order.
    pub models: Vec<String>,
    pub max_tokens: u32,
}

impl ProviderConfig {
    /// Defaults for `vars` without reading the environment.
    pub fn defaults(vars: &EnvVars) -> Self {
        Self {
            label: vars.label.to_string(),
            credential_var: vars.key_vars.first().copied().unwrap_or_default().to_string(),
            api_key: None,
            placeholder: vars.placeholder.to_string(),
            api_url: vars.default_url.to_string(),
            models: vars.default_models.iter().map(|m| m.to_string()).collect(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Read configuration from environment variables.
    ///
    /// A missing credential is not an error here: adapters report it per
    /// request so one unconfigured vendor never blocks the others.
    pub fn from_env(vars: &EnvVars) -> Self {
        let mut config = Self::defaults(vars);

        config.api_key = vars
            .key_vars
            .iter()
            .filter_map(|var| env::var(var).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty());

        if let Ok(url) = env::var(vars.url_var) {
            if !url.trim().is_empty() {
                config.api_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        if let Ok(models) = env::var(vars.models_var) {
            let models: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if !models.is_empty() {
                config.models = models;
            }
        }

        config.max_tokens = env::var(vars.max_tokens_var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        config
    }

    /// Start a builder from the defaults of `vars`.
    pub fn builder(vars: &EnvVars) -> ProviderConfigBuilder {
        ProviderConfigBuilder {
            config: Self::defaults(vars),
        }
    }

    /// The usable credential, or `CredentialMissing`.
    pub fn credential(&self) -> Result<&str, ProviderError> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() && key != self.placeholder => Ok(key),
            _ => Err(ProviderError::credential_missing(
                &self.label,
                &self.credential_var,
            )),
        }
    }

    /// Whether a usable credential is configured.
    pub fn has_credential(&self) -> bool {
        self.credential().is_ok()
    }

    /// First model in priority order.
    pub fn default_model(&self) -> &str {
        self.models.first().map(String::as_str).unwrap_or_default()
    }
}

/// Builder for [`ProviderConfig`].
#[derive(Debug)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Replace the model list.
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProviderConfig {
        self.config
    }
}
