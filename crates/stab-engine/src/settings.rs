//! Layered process settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional settings
//! file (format picked from its extension), then `STAB_*` environment
//! variables. Nested keys use `__`, e.g. `STAB_ENGINE__BASE_FEE=2000`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stab_core::config::EngineConfig;
use stab_core::error::ConfigError;
use stab_core::types::AccountId;
use tracing::debug;

pub const ENV_PREFIX: &str = "STAB";
pub const DEFAULT_OWNER: &str = "treasury";
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Account allowed to credit, open exempt accounts and reconfigure.
    pub owner: AccountId,
    /// Seconds between health ticks.
    pub tick_interval_secs: u64,
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner: AccountId::from(DEFAULT_OWNER),
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            engine: EngineConfig::default(),
        }
    }
}

fn source_error(e: config::ConfigError) -> ConfigError {
    ConfigError::Source(e.to_string())
}

impl Settings {
    /// Load from defaults, `path` if given, and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// As [`Settings::load`], reading variables from `env` instead of the
    /// process environment when it is `Some`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Settings::default()).map_err(source_error)?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings: Settings = builder
            .build()
            .map_err(source_error)?
            .try_deserialize()
            .map_err(source_error)?;
        settings.validate()?;
        debug!(
            owner = %settings.owner,
            tick_interval_secs = settings.tick_interval_secs,
            file = ?path,
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "tick_interval_secs must be positive".into(),
            ));
        }
        if self.owner.as_str().is_empty() {
            return Err(ConfigError::InvalidConfiguration("owner must not be empty".into()));
        }
        self.engine.validate()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}
