use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

pub const DEFAULT_DATABASE_PATH: &str = "reviews.db";
pub const IN_MEMORY_DATABASE_PATH: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file backing the review store, or `:memory:`.
    pub database_path: String,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        StoreConfig {
            database_path: IN_MEMORY_DATABASE_PATH.to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
        }
    }
}

/// Reads `REVIEWS_*` environment variables over the built-in defaults.
pub fn load_config() -> Result<StoreConfig, ReviewError> {
    Figment::from(Serialized::defaults(StoreConfig::default()))
        .merge(Env::prefixed("REVIEWS_"))
        .extract()
        .map_err(|config_error| ReviewError::Configuration(config_error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_environment() {
        Jail::expect_with(|_jail| {
            assert_eq!(load_config().unwrap(), StoreConfig::default());
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_database_path() {
        Jail::expect_with(|jail| {
            jail.set_env("REVIEWS_DATABASE_PATH", "/var/lib/timebank/reviews.db");
            let config = load_config().unwrap();
            assert_eq!(config.database_path, "/var/lib/timebank/reviews.db");
            Ok(())
        });
    }
}
