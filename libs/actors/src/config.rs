//! Actor System Configuration
//!
//! Construction-time settings for an [`ActorSystem`](crate::ActorSystem).
//! Settings can be given in code, or loaded from a TOML file layered under
//! `PIPES_ACTORS_*` environment variables.

use crate::error::{ActorSystemError, Result};
use anyhow::Context;
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default idle window that ends an output stream
pub const DEFAULT_NO_OUTCOME_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on concurrently running per-message dispatch tasks
pub const DEFAULT_MAX_INFLIGHT_DISPATCHES: usize = 1024;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "PIPES_ACTORS";

/// What happens to a message the dispatch loop cannot deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Log, count, and publish a failure record on the failure queue
    #[default]
    Surface,
    /// Count and log at debug level only
    SilentDrop,
}

/// Actor system settings
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSystemConfig {
    /// A stream ends after this long without new output
    pub no_outcome_timeout: Duration,
    /// Verbose per-message trace logging; no behavioral effect
    pub debug: bool,
    /// Permits shared by both dispatch loops
    pub max_inflight_dispatches: usize,
    pub delivery_policy: DeliveryPolicy,
}

impl Default for ActorSystemConfig {
    fn default() -> Self {
        Self {
            no_outcome_timeout: DEFAULT_NO_OUTCOME_TIMEOUT,
            debug: false,
            max_inflight_dispatches: DEFAULT_MAX_INFLIGHT_DISPATCHES,
            delivery_policy: DeliveryPolicy::Surface,
        }
    }
}

impl ActorSystemConfig {
    pub fn with_no_outcome_timeout(mut self, timeout: Duration) -> Self {
        self.no_outcome_timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_inflight_dispatches(mut self, max: usize) -> Self {
        self.max_inflight_dispatches = max;
        self
    }

    pub fn with_delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.delivery_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.no_outcome_timeout.is_zero() {
            return Err(ActorSystemError::configuration(
                "no_outcome_timeout must be greater than 0",
                Some("no_outcome_timeout"),
            ));
        }
        if self.max_inflight_dispatches == 0 {
            return Err(ActorSystemError::configuration(
                "max_inflight_dispatches must be greater than 0",
                Some("max_inflight_dispatches"),
            ));
        }
        Ok(())
    }

    /// Load configuration from an optional TOML file with environment overrides
    ///
    /// A missing file is not an error; every key falls back to its default.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!("Loading actor system config: {:?}", path);
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let raw: ActorSystemConfigToml = builder
            .build()
            .context("Failed to build actor system configuration")?
            .try_deserialize()
            .context("Failed to deserialize actor system configuration")?;

        let config = raw.to_config();
        config
            .validate()
            .context("Invalid actor system configuration")?;

        info!(
            no_outcome_timeout_ms = config.no_outcome_timeout.as_millis() as u64,
            max_inflight_dispatches = config.max_inflight_dispatches,
            delivery_policy = ?config.delivery_policy,
            debug = config.debug,
            "Loaded actor system configuration"
        );
        Ok(config)
    }
}

/// Configuration in TOML/environment form
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActorSystemConfigToml {
    pub no_outcome_timeout_ms: Option<u64>,
    pub debug: Option<bool>,
    pub max_inflight_dispatches: Option<usize>,
    pub delivery_policy: Option<DeliveryPolicy>,
}

impl ActorSystemConfigToml {
    /// Convert to `ActorSystemConfig`, filling unset keys with defaults
    pub fn to_config(&self) -> ActorSystemConfig {
        let defaults = ActorSystemConfig::default();
        ActorSystemConfig {
            no_outcome_timeout: self
                .no_outcome_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.no_outcome_timeout),
            debug: self.debug.unwrap_or(defaults.debug),
            max_inflight_dispatches: self
                .max_inflight_dispatches
                .unwrap_or(defaults.max_inflight_dispatches),
            delivery_policy: self.delivery_policy.unwrap_or(defaults.delivery_policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    /// `load()` reads process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = ActorSystemConfig::default();
        assert_eq!(config.no_outcome_timeout, Duration::from_secs(10));
        assert!(!config.debug);
        assert_eq!(config.delivery_policy, DeliveryPolicy::Surface);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let zero_timeout = ActorSystemConfig::default().with_no_outcome_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let zero_pool = ActorSystemConfig::default().with_max_inflight_dispatches(0);
        match zero_pool.validate() {
            Err(ActorSystemError::Configuration { field, .. }) => {
                assert_eq!(field.as_deref(), Some("max_inflight_dispatches"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_toml_conversion_fills_defaults() {
        let raw = ActorSystemConfigToml {
            no_outcome_timeout_ms: Some(250),
            delivery_policy: Some(DeliveryPolicy::SilentDrop),
            ..Default::default()
        };
        let config = raw.to_config();

        assert_eq!(config.no_outcome_timeout, Duration::from_millis(250));
        assert_eq!(config.delivery_policy, DeliveryPolicy::SilentDrop);
        assert_eq!(config.max_inflight_dispatches, DEFAULT_MAX_INFLIGHT_DISPATCHES);
    }

    #[test]
    fn test_load_from_file() {
        let _env = ENV_LOCK.lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "no_outcome_timeout_ms = 1500\ndebug = true\nmax_inflight_dispatches = 8\ndelivery_policy = \"silent_drop\""
        )
        .unwrap();

        let config = ActorSystemConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.no_outcome_timeout, Duration::from_millis(1500));
        assert!(config.debug);
        assert_eq!(config.max_inflight_dispatches, 8);
        assert_eq!(config.delivery_policy, DeliveryPolicy::SilentDrop);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _env = ENV_LOCK.lock();
        let dir = tempfile::tempdir().unwrap();
        let config = ActorSystemConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, ActorSystemConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let _env = ENV_LOCK.lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_inflight_dispatches = 0").unwrap();

        assert!(ActorSystemConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let _env = ENV_LOCK.lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_inflight_dispatches = 8\ndebug = false").unwrap();

        std::env::set_var("PIPES_ACTORS_MAX_INFLIGHT_DISPATCHES", "3");
        std::env::set_var("PIPES_ACTORS_DEBUG", "true");
        let loaded = ActorSystemConfig::load(Some(file.path()));
        std::env::remove_var("PIPES_ACTORS_MAX_INFLIGHT_DISPATCHES");
        std::env::remove_var("PIPES_ACTORS_DEBUG");

        let config = loaded.unwrap();
        assert_eq!(config.max_inflight_dispatches, 3);
        assert!(config.debug);
        assert_eq!(config.no_outcome_timeout, DEFAULT_NO_OUTCOME_TIMEOUT);
    }
}
