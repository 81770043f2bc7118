//! Configuration for the OCP usage aggregator: where to read partitioned
//! input from, where to write summary rows, which billing period this run
//! covers, and which execution-mode knobs apply.

use core_config::aggregator::AggregatorConfig;
use core_config::identity::RunIdentity;
use core_config::object_store::ObjectStoreConfig;
use core_config::FromEnv;
use database::postgres::PostgresConfig;
use eyre::Result;

#[derive(Clone, Debug)]
pub struct Config {
    pub object_store: ObjectStoreConfig,
    pub database: PostgresConfig,
    pub identity: RunIdentity,
    pub aggregator: AggregatorConfig,
}

impl Config {
    /// Load every sub-configuration from its own environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            object_store: ObjectStoreConfig::from_env()?,
            database: PostgresConfig::from_env()?,
            identity: RunIdentity::from_env()?,
            aggregator: AggregatorConfig::from_env()?,
        })
    }
}
