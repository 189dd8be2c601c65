//! Ordered set of providers a request can fan out to.

use std::sync::Arc;

use indexmap::IndexMap;
use provider_core::Provider;
use tracing::info;

/// Providers keyed by id, in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: IndexMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own id, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let id = provider.id().to_string();
        info!("Registered provider {} with models {:?}", id, provider.list_models());
        self.providers.insert(id, provider);
    }

    /// Builder-style [`ProviderRegistry::register`].
    pub fn with(mut self, provider: impl Provider + 'static) -> Self {
        self.register(Arc::new(provider));
        self
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Every provider's model list.
    pub fn models(&self) -> IndexMap<String, Vec<String>> {
        self.providers
            .iter()
            .map(|(id, provider)| (id.clone(), provider.list_models()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Human-readable list of ids, e.g. `openai, anthropic o grok`.
    pub fn describe(&self) -> String {
        let ids = self.ids();
        match ids.split_last() {
            None => String::new(),
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} o {}", rest.join(", "), last),
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_provider::EchoProvider;

    #[test]
    fn test_registration_order_and_lookup() {
        let registry = ProviderRegistry::new()
            .with(EchoProvider::new("openai"))
            .with(EchoProvider::new("anthropic"))
            .with(EchoProvider::new("grok"));

        assert_eq!(registry.ids(), vec!["openai", "anthropic", "grok"]);
        assert!(registry.contains("anthropic"));
        assert!(registry.get("gemini").is_none());
        assert_eq!(registry.models()["grok"], vec!["grok-mock"]);
        assert_eq!(registry.describe(), "openai, anthropic o grok");
    }

    #[test]
    fn test_describe_small() {
        assert_eq!(ProviderRegistry::new().describe(), "");
        assert_eq!(
            ProviderRegistry::new().with(EchoProvider::new("openai")).describe(),
            "openai"
        );
    }
}
