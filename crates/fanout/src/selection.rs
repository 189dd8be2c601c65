//! Branch selections and model resolution.

use provider_core::{Attachment, Provider, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gate::admits_all;

/// One requested branch: a provider, optionally a model and temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSelection {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl BranchSelection {
    /// Select `provider` with its default model and temperature.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            temperature: None,
        }
    }

    /// Request a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Request a specific temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// The temperature to use.
    pub fn effective_temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// The requested model, if a non-blank one was given.
    pub fn requested_model(&self) -> Option<&str> {
        self.model.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Result of model resolution for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// The model the branch will call.
    pub model: String,
    /// The model the caller asked for, when a different one was chosen.
    pub substituted_for: Option<String>,
}

/// Choose the model a branch will use.
///
/// The requested model (or the provider's first model) is kept unless it
/// cannot take every attachment. In that case, and only if substitution
/// is enabled, the first model in the provider's priority order that can
/// is used instead. When no model qualifies the caller's choice stands.
pub fn resolve_model(
    provider: &dyn Provider,
    requested: Option<&str>,
    attachments: &[Attachment],
    auto_substitute: bool,
) -> ResolvedModel {
    let requested = requested
        .map(str::to_string)
        .unwrap_or_else(|| provider.default_model());

    let keep = ResolvedModel {
        model: requested.clone(),
        substituted_for: None,
    };

    if attachments.is_empty() || !auto_substitute || admits_all(&requested, attachments) {
        return keep;
    }

    match provider
        .list_models()
        .into_iter()
        .find(|candidate| admits_all(candidate, attachments))
    {
        Some(model) => {
            info!(
                "Auto-selected {} instead of {} for {} due to attachment requirements",
                model,
                requested,
                provider.id()
            );
            ResolvedModel {
                model,
                substituted_for: Some(requested),
            }
        }
        None => keep,
    }
}
