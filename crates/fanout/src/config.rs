//! Orchestrator configuration.

use std::env;
use std::time::Duration;

/// Default capacity of the outbound event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for [`crate::Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Swap in a capable model when the requested one can't take the
    /// attachments.
    pub auto_substitute_models: bool,

    /// Fail a branch that produces no event for this long.
    pub idle_timeout: Option<Duration>,

    /// Capacity of the bounded channel branches write into.
    pub channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_substitute_models: true,
            idle_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `FANOUT_AUTO_SUBSTITUTE` - substitute models for attachments (default: true)
    /// - `FANOUT_IDLE_TIMEOUT_SECS` - per-branch idle timeout, 0 disables (default: off)
    /// - `FANOUT_CHANNEL_CAPACITY` - outbound channel capacity (default: 64)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let auto_substitute_models = env::var("FANOUT_AUTO_SUBSTITUTE")
            .ok()
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(defaults.auto_substitute_models);

        let idle_timeout = env::var("FANOUT_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let channel_capacity = env::var("FANOUT_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|capacity| *capacity > 0)
            .unwrap_or(defaults.channel_capacity);

        Self {
            auto_substitute_models,
            idle_timeout,
            channel_capacity,
        }
    }

    /// Create a new config builder.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }
}

/// Builder for OrchestratorConfig.
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// Enable or disable model substitution.
    pub fn auto_substitute_models(mut self, enable: bool) -> Self {
        self.config.auto_substitute_models = enable;
        self
    }

    /// Set the per-branch idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    /// Set the outbound channel capacity (minimum 1).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(config.auto_substitute_models);
        assert!(config.idle_timeout.is_none());
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::builder()
            .auto_substitute_models(false)
            .idle_timeout(Duration::from_secs(5))
            .channel_capacity(0)
            .build();
        assert!(!config.auto_substitute_models);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.channel_capacity, 1);
    }

    // Env vars are process-global, so every env scenario runs in one test.
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        fn clear_all() {
            std::env::remove_var("FANOUT_AUTO_SUBSTITUTE");
            std::env::remove_var("FANOUT_IDLE_TIMEOUT_SECS");
            std::env::remove_var("FANOUT_CHANNEL_CAPACITY");
        }

        clear_all();
        assert_eq!(OrchestratorConfig::from_env(), OrchestratorConfig::default());

        clear_all();
        std::env::set_var("FANOUT_AUTO_SUBSTITUTE", "false");
        std::env::set_var("FANOUT_IDLE_TIMEOUT_SECS", "30");
        std::env::set_var("FANOUT_CHANNEL_CAPACITY", "8");
        let config = OrchestratorConfig::from_env();
        assert!(!config.auto_substitute_models);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.channel_capacity, 8);

        clear_all();
        std::env::set_var("FANOUT_IDLE_TIMEOUT_SECS", "0");
        std::env::set_var("FANOUT_CHANNEL_CAPACITY", "0");
        let config = OrchestratorConfig::from_env();
        assert!(config.idle_timeout.is_none());
        assert_eq!(config.channel_capacity, 64);

        clear_all();
    }
}
