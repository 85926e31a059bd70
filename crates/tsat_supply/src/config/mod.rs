//! Configuration resolution and deployment settings.

mod resolver;
mod settings;

pub use resolver::{
    parse_configuration, ConfigError, ConfigResolver, Configuration, CONFIG_PATH_ENV,
};
pub use settings::{
    SupplySettings, DEFAULT_CACHE_KEY, DEFAULT_CACHE_TTL_SECS, DEFAULT_DECIMALS,
    DEFAULT_FALLBACK_TTL_SECS, DEFAULT_TOTAL_SUPPLY,
};
