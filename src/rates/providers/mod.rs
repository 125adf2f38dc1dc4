pub mod coingecko;
pub mod exchange_rate;

pub use coingecko::CoinGeckoSource;
pub use exchange_rate::ExchangeRateSource;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use super::{ApiErrorKind, ApiRequestError, RateProvider};
use crate::clock::Clock;
use crate::config::ResolvedConfig;

const USER_AGENT: &str = concat!("walletbook/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in an [`ApiErrorKind::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Builds the configured providers in update order: crypto first, then fiat,
/// so fiat rates win if both ever produce the same pair.
pub fn build_providers(config: &ResolvedConfig, clock: Arc<dyn Clock>) -> Vec<RateProvider> {
    let client = Client::new();
    let rates = &config.rates;

    let crypto = CoinGeckoSource::new(config.base_currency.clone())
        .with_client(client.clone())
        .with_endpoint(rates.coingecko_url.clone())
        .with_symbols(rates.crypto_currencies.clone())
        .with_custom_mappings(rates.crypto_ids.clone())
        .with_timeout(rates.request_timeout)
        .with_clock(clock.clone());

    let fiat = ExchangeRateSource::new(config.base_currency.clone())
        .with_client(client)
        .with_endpoint(rates.exchange_rate_url.clone())
        .with_symbols(rates.fiat_currencies.clone())
        .with_timeout(rates.request_timeout)
        .with_clock(clock);

    vec![crypto.into(), fiat.into()]
}

/// Single GET returning a parsed JSON body.
///
/// Any non-success status, transport failure or undecodable body becomes an
/// [`ApiRequestError`] tagged with `provider`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: &str,
    url: &str,
    query: &[(&str, String)],
    timeout: Duration,
) -> Result<T, ApiRequestError> {
    let network =
        |e: reqwest::Error| ApiRequestError::new(provider, ApiErrorKind::Network(e.to_string()));

    let response = client
        .get(url)
        .query(query)
        .timeout(timeout)
        .header("Accept", "application/json")
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(network)?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        return Err(ApiRequestError::new(
            provider,
            ApiErrorKind::Status {
                status: status.as_u16(),
                body,
            },
        ));
    }

    let body = response.text().await.map_err(network)?;
    serde_json::from_str(&body)
        .map_err(|e| ApiRequestError::new(provider, ApiErrorKind::Malformed(e.to_string())))
}
