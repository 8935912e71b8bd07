//! # Tidvakt Configuration System
//!
//! Layered runtime configuration for the event bus, its filter rules and
//! telemetry. Capacities are compile-time constants in `tidvakt-core`; this
//! crate only selects behaviour within them and rejects values that would
//! not fit.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod bus;
mod error;
mod filters;
mod telemetry;
mod validation;

pub use bus::{BusConfig, LevelConfig};
pub use error::ConfigError;
pub use filters::{FilterConfig, RuleConfig, RuleKindConfig};
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/tidvakt.yaml";
const ENV_PREFIX: &str = "TIDVAKT_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct TidvaktConfig {
    /// Queue policies, deadline and feature switches of the event bus.
    #[serde(default)]
    #[validate(nested)]
    pub bus: BusConfig,

    /// Filter rules loaded at startup.
    #[serde(default)]
    #[validate(nested)]
    pub filters: FilterConfig,

    /// Logging and metrics.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl TidvaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/tidvakt.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<TIDVAKT_ENV>.yaml` - Environment-specific overrides.
    /// 4. `TIDVAKT_*` environment variables, `__` separating nested keys.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(TidvaktConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("TIDVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific path, still honouring `TIDVAKT_*` overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(TidvaktConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
