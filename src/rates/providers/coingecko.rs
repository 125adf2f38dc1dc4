//! CoinGecko crypto rate provider.
//!
//! Uses the free `/simple/price` endpoint: one request returns the current
//! price of every requested coin against the base currency.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::get_json;
use crate::clock::{Clock, SystemClock};
use crate::models::CurrencyCode;
use crate::rates::{ApiRequestError, PairId, RateRecord, RateSet};

pub const COINGECKO_SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Label written into `RateRecord::source`.
pub const COINGECKO_SOURCE: &str = "CoinGecko";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// `{"bitcoin": {"usd": 60000.0}, ...}`; a coin may map to `null` prices.
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

/// Fetches `SYMBOL_BASE` rates for a fixed set of crypto symbols.
#[derive(Clone)]
pub struct CoinGeckoSource {
    client: Client,
    endpoint: String,
    base: CurrencyCode,
    symbols: Vec<CurrencyCode>,
    /// Symbol to CoinGecko id overrides, checked before the built-in table.
    custom_ids: HashMap<CurrencyCode, String>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CoinGeckoSource {
    /// Creates a source quoting BTC, ETH and SOL in `base`.
    pub fn new(base: CurrencyCode) -> Self {
        let symbols = ["BTC", "ETH", "SOL"]
            .into_iter()
            .filter_map(|s| CurrencyCode::parse(s).ok())
            .collect();
        Self {
            client: Client::new(),
            endpoint: COINGECKO_SIMPLE_PRICE_URL.to_string(),
            base,
            symbols,
            custom_ids: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Overrides the full `/simple/price` URL (used to point at a mock server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<CurrencyCode>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_custom_mappings(mut self, mappings: HashMap<CurrencyCode, String>) -> Self {
        self.custom_ids = mappings;
        self
    }

    pub fn with_mapping(mut self, symbol: CurrencyCode, coingecko_id: impl Into<String>) -> Self {
        self.custom_ids.insert(symbol, coingecko_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        "coingecko"
    }

    /// Maps a symbol to a CoinGecko coin id: custom mappings first, then the
    /// built-in table.
    fn coingecko_id(&self, symbol: &CurrencyCode) -> Option<String> {
        if let Some(id) = self.custom_ids.get(symbol) {
            return Some(id.clone());
        }

        let id = match symbol.as_str() {
            "BTC" => "bitcoin",
            "ETH" => "ethereum",
            "SOL" => "solana",
            "USDT" => "tether",
            "USDC" => "usd-coin",
            "BNB" => "binancecoin",
            "XRP" => "ripple",
            "ADA" => "cardano",
            "DOGE" => "dogecoin",
            "DOT" => "polkadot",
            "LTC" => "litecoin",
            "TRX" => "tron",
            "AVAX" => "avalanche-2",
            "DAI" => "dai",
            "LINK" => "chainlink",
            "ATOM" => "cosmos",
            "XLM" => "stellar",
            "XMR" => "monero",
            _ => return None,
        };

        Some(id.to_string())
    }

    /// Fetches current prices for every configured symbol.
    ///
    /// Symbols with no known coin id, or missing from the response, are
    /// skipped rather than failing the call.
    pub async fn fetch_rates(&self) -> Result<RateSet, ApiRequestError> {
        let wanted: Vec<(CurrencyCode, String)> = self
            .symbols
            .iter()
            .filter_map(|symbol| match self.coingecko_id(symbol) {
                Some(id) => Some((symbol.clone(), id)),
                None => {
                    warn!(symbol = %symbol, "No CoinGecko id for symbol; skipping");
                    None
                }
            })
            .collect();

        if wanted.is_empty() {
            return Ok(RateSet::new());
        }

        let vs_currency = self.base.as_str().to_lowercase();
        let ids = wanted
            .iter()
            .map(|(_, id)| id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let data: SimplePriceResponse = get_json(
            &self.client,
            self.name(),
            &self.endpoint,
            &[("ids", ids), ("vs_currencies", vs_currency.clone())],
            self.timeout,
        )
        .await?;

        let now = self.clock.now();
        let mut rates = RateSet::new();
        for (symbol, id) in wanted {
            let price = data
                .get(&id)
                .and_then(|prices| prices.get(&vs_currency))
                .copied()
                .flatten();

            let Some(price) = price else {
                debug!(symbol = %symbol, coin_id = %id, "Coin missing from CoinGecko response");
                continue;
            };

            match RateRecord::new(price, now, COINGECKO_SOURCE) {
                Ok(record) => {
                    rates.insert(PairId::new(symbol, self.base.clone()), record);
                }
                Err(e) => debug!(symbol = %symbol, error = %e, "Ignoring CoinGecko price"),
            }
        }

        Ok(rates)
    }
}

impl fmt::Debug for CoinGeckoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoinGeckoSource")
            .field("endpoint", &self.endpoint)
            .field("base", &self.base)
            .field("symbols", &self.symbols)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
