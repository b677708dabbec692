use std::path::Path;

use crate::{
    conf::{StorageConfig, UpdateConfig},
    core::StrataError::{self, ConfigParsingError},
};
use config::{Config as CConfig, Environment};
use serde::{Deserialize, Serialize};

// settings read as comma-separated lists from the environment
const LIST_KEYS: &[&str] = &[
    "update.partition_on",
    "update.secondary_indices",
    "update.sort_partitions_by",
    "update.bucket_by",
];

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    pub update: UpdateConfig,
}

impl Config {
    pub fn from_str(toml_str: &str) -> Result<Config, StrataError> {
        Self::build(CConfig::builder().add_source(config::File::from_str(
            toml_str,
            config::FileFormat::Toml,
        )))
    }

    /// Load a TOML file, with `STRATA_`-prefixed environment overrides
    /// (e.g. `STRATA_UPDATE__NUM_BUCKETS=8`). List settings take
    /// comma-separated values: `STRATA_UPDATE__PARTITION_ON=region,country`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, StrataError> {
        Self::from_file_with_env(path.as_ref(), Self::environment())
    }

    fn environment() -> Environment {
        LIST_KEYS.iter().fold(
            Environment::with_prefix("STRATA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
            |env, key| env.with_list_parse_key(key),
        )
    }

    fn from_file_with_env(path: &Path, env: Environment) -> Result<Config, StrataError> {
        let builder = CConfig::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(env);
        Self::build(builder)
    }

    fn build(
        builder: config::builder::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Config, StrataError> {
        let config = builder
            .build()
            .map_err(|e| ConfigParsingError(e.to_string()))?
            .try_deserialize::<Config>()
            .map_err(|e| ConfigParsingError(e.to_string()))?;
        config.update.validate()?;
        Ok(config)
    }
}
