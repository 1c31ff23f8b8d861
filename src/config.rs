//! Engine configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional file
//! (TOML, YAML or JSON by extension), then `WAYFINDER__SECTION__KEY`
//! environment variables.

use std::path::Path;

use action_flow::ExecutorConfig;
use agent_core::AgentLoopConfig;
use cdp_adapter::CdpConfig;
use config::{Config, ConfigError, Environment, File};
use perceiver_structural::IndexOptions;
use serde::{Deserialize, Serialize};
use wayfinder_plan_cache::CacheConfig;

pub const ENV_PREFIX: &str = "WAYFINDER";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub browser: CdpConfig,
    pub index: IndexOptions,
    pub executor: ExecutorConfig,
    pub cache: CacheConfig,
    pub agent: AgentLoopConfig,
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&EngineConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
