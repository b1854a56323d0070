//! Runtime settings.
//!
//! Sources, later ones winning: built-in defaults, an optional
//! `config/tradesync.toml`, then `TRADESYNC__*` environment variables
//! (`TRADESYNC__EXCHANGE__BASE_URL`, `TRADESYNC__SIZING__QTY_FRACTION`, ...).

use serde::{Deserialize, Serialize};

use crate::risk::PositionSizing;
use crate::Result;

pub const DEFAULT_CONFIG_PATH: &str = "config/tradesync";
const ENV_PREFIX: &str = "TRADESYNC";

/// Exchange REST connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    /// Selects the testnet key pair from the secret document
    pub testnet: bool,
    /// Added to the local clock when stamping signed requests
    pub timestamp_skew_ms: i64,
    pub request_timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api-testnet.bybit.com".to_string(),
            testnet: true,
            timestamp_skew_ms: 800,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub redis_url: String,
    /// Id passed to the secret provider (`creds/bybit` reads env `CREDS_BYBIT`)
    pub secret_id: String,
    pub exchange: ExchangeSettings,
    pub sizing: PositionSizing,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            secret_id: "creds/bybit".to_string(),
            exchange: ExchangeSettings::default(),
            sizing: PositionSizing::default(),
        }
    }
}

impl Settings {
    /// Default config file plus environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path` (extension optional, file may be absent) and environment
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        tracing::debug!(
            redis_url = %settings.redis_url,
            base_url = %settings.exchange.base_url,
            testnet = settings.exchange.testnet,
            "Loaded settings"
        );
        Ok(settings)
    }
}
