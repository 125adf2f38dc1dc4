//! Fiat rate provider for exchangerate.host-style `latest` endpoints.
//!
//! The endpoint answers `base=USD&symbols=EUR,GBP` with how many units of
//! each symbol one unit of the base buys. Records are stored the other way
//! round, as `SYMBOL_BASE`, so fiat pairs read like the crypto ones
//! (price of one unit of SYMBOL in BASE).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::get_json;
use crate::clock::{Clock, SystemClock};
use crate::models::CurrencyCode;
use crate::rates::{ApiErrorKind, ApiRequestError, PairId, RateRecord, RateSet};

pub const EXCHANGE_RATE_LATEST_URL: &str = "https://api.exchangerate.host/latest";

/// Label written into `RateRecord::source`.
pub const EXCHANGE_RATE_SOURCE: &str = "ExchangeRate";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: Option<HashMap<String, Option<f64>>>,
    /// Some deployments answer 200 with `{"success": false, "error": {...}}`.
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Fetches `SYMBOL_BASE` rates for a fixed set of fiat currencies.
#[derive(Clone)]
pub struct ExchangeRateSource {
    client: Client,
    endpoint: String,
    base: CurrencyCode,
    symbols: Vec<CurrencyCode>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ExchangeRateSource {
    /// Creates a source quoting EUR, GBP and RUB against `base`.
    pub fn new(base: CurrencyCode) -> Self {
        let symbols = ["EUR", "GBP", "RUB"]
            .into_iter()
            .filter_map(|s| CurrencyCode::parse(s).ok())
            .collect();
        Self {
            client: Client::new(),
            endpoint: EXCHANGE_RATE_LATEST_URL.to_string(),
            base,
            symbols,
            timeout: DEFAULT_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<CurrencyCode>) -> Self {
        self.symbols = symbols;
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
        "exchangerate"
    }

    /// Fetches the latest rates for every configured symbol.
    ///
    /// Fails when the body has no `rates` object; individual symbols missing
    /// from it are skipped.
    pub async fn fetch_rates(&self) -> Result<RateSet, ApiRequestError> {
        let symbols: Vec<&CurrencyCode> =
            self.symbols.iter().filter(|s| **s != self.base).collect();
        if symbols.is_empty() {
            return Ok(RateSet::new());
        }

        let joined = symbols
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let response: LatestResponse = get_json(
            &self.client,
            self.name(),
            &self.endpoint,
            &[("base", self.base.to_string()), ("symbols", joined)],
            self.timeout,
        )
        .await?;

        let Some(quoted) = response.rates else {
            let detail = match response.error {
                Some(error) => format!("response has no rates field (error: {error})"),
                None => "response has no rates field".to_string(),
            };
            return Err(ApiRequestError::new(self.name(), ApiErrorKind::Malformed(detail)));
        };

        let now = self.clock.now();
        let mut rates = RateSet::new();
        for symbol in symbols {
            let Some(base_to_symbol) = quoted.get(symbol.as_str()).copied().flatten() else {
                debug!(symbol = %symbol, "Currency missing from exchange rate response");
                continue;
            };

            match RateRecord::new(1.0 / base_to_symbol, now, EXCHANGE_RATE_SOURCE) {
                Ok(record) => {
                    rates.insert(PairId::new(symbol.clone(), self.base.clone()), record);
                }
                Err(e) => debug!(symbol = %symbol, error = %e, "Ignoring exchange rate"),
            }
        }

        Ok(rates)
    }
}

impl fmt::Debug for ExchangeRateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeRateSource")
            .field("endpoint", &self.endpoint)
            .field("base", &self.base)
            .field("symbols", &self.symbols)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_response() {
        let body = r#"{"base": "USD", "date": "2024-05-01", "rates": {"EUR": 0.8, "GBP": 0.5}}"#;
        let response: LatestResponse = serde_json::from_str(body).unwrap();
        let rates = response.rates.unwrap();
        assert_eq!(rates["EUR"], Some(0.8));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_parse_error_response_without_rates() {
        let body = r#"{"success": false, "error": {"code": 101, "type": "missing_access_key"}}"#;
        let response: LatestResponse = serde_json::from_str(body).unwrap();
        assert!(response.rates.is_none());
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_only_base_symbol_skips_http() {
        let usd = CurrencyCode::parse("USD").unwrap();
        let source = ExchangeRateSource::new(usd.clone())
            .with_endpoint("http://127.0.0.1:9/latest")
            .with_symbols(vec![usd]);

        assert!(source.fetch_rates().await.unwrap().is_empty());
    }
}
