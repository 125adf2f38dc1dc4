use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::models::CurrencyCode;
use crate::rates::providers::coingecko::COINGECKO_SIMPLE_PRICE_URL;
use crate::rates::providers::exchange_rate::EXCHANGE_RATE_LATEST_URL;
use crate::rates::EmptyUpdatePolicy;

fn code(value: &'static str) -> CurrencyCode {
    CurrencyCode::from_static(value)
}

fn codes(values: &[&'static str]) -> Vec<CurrencyCode> {
    values.iter().copied().map(code).collect()
}

fn default_base_currency() -> CurrencyCode {
    code("USD")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_rates_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Rate provider and cache settings (`[rates]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Crypto symbols quoted by CoinGecko.
    pub crypto_currencies: Vec<CurrencyCode>,

    /// Symbol to CoinGecko coin id (e.g. `BTC = "bitcoin"`).
    pub crypto_ids: HashMap<CurrencyCode, String>,

    /// Fiat codes quoted by the exchange rate endpoint.
    pub fiat_currencies: Vec<CurrencyCode>,

    pub coingecko_url: String,
    pub exchange_rate_url: String,

    /// Per-request timeout applied to every provider call.
    #[serde(
        default = "default_request_timeout",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,

    /// Age after which the cached snapshot is reported as stale.
    #[serde(
        default = "default_rates_ttl",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub ttl: Duration,

    /// Snapshot file name, relative to the data directory.
    pub snapshot_file: PathBuf,

    /// History file name, relative to the data directory.
    pub history_file: PathBuf,

    pub on_empty_update: EmptyUpdatePolicy,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            crypto_currencies: codes(&["BTC", "ETH", "SOL"]),
            crypto_ids: [("BTC", "bitcoin"), ("ETH", "ethereum"), ("SOL", "solana")]
                .into_iter()
                .map(|(symbol, id)| (code(symbol), id.to_string()))
                .collect(),
            fiat_currencies: codes(&["EUR", "GBP", "RUB"]),
            coingecko_url: COINGECKO_SIMPLE_PRICE_URL.to_string(),
            exchange_rate_url: EXCHANGE_RATE_LATEST_URL.to_string(),
            request_timeout: default_request_timeout(),
            ttl: default_rates_ttl(),
            snapshot_file: PathBuf::from("rates.json"),
            history_file: PathBuf::from("exchange_rates.json"),
            on_empty_update: EmptyUpdatePolicy::default(),
        }
    }
}

/// Contents of `walletbook.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where users, portfolios, rates and the session live. Relative paths
    /// are taken from the config file's directory, which is also the default.
    pub data_dir: Option<PathBuf>,

    /// Currency every rate is quoted against (e.g., "USD").
    #[serde(default = "default_base_currency")]
    pub base_currency: CurrencyCode,

    #[serde(default)]
    pub rates: RatesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            base_currency: default_base_currency(),
            rates: RatesConfig::default(),
        }
    }
}

impl Config {
    /// Parses a TOML config file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Absolute `data_dir`, joined onto `config_dir` when relative.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Configuration with the data directory made concrete.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub base_currency: CurrencyCode,
    pub rates: RatesConfig,
}

impl ResolvedConfig {
    /// Reads `config_path`, which must exist.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        Ok(Self::from_config(config, config_dir))
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// Without a file, the intended parent directory becomes the data directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };

        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Self::from_config(Config::default(), config_dir))
    }

    fn from_config(config: Config, config_dir: &Path) -> Self {
        Self {
            data_dir: config.resolve_data_dir(config_dir),
            base_currency: config.base_currency,
            rates: config.rates,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.rates.snapshot_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.rates.history_file)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./walletbook.toml` if it exists in current directory
/// 2. `~/.local/share/walletbook/walletbook.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("walletbook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("walletbook").join("walletbook.toml");
    }

    local_config
}
