#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use walletbook::clock::{Clock, SteppingClock};
use walletbook::models::CurrencyCode;
use walletbook::rates::providers::{CoinGeckoSource, ExchangeRateSource};
use walletbook::rates::RateStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COINGECKO_PATH: &str = "/api/v3/simple/price";
pub const EXCHANGE_RATE_PATH: &str = "/latest";

pub fn code(value: &str) -> CurrencyCode {
    CurrencyCode::parse(value).expect("valid currency code")
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Clock that advances one second per reading, so every write gets a new stamp.
pub fn stepping_clock() -> Arc<dyn Clock> {
    Arc::new(SteppingClock::new(start_time(), chrono::Duration::seconds(1)))
}

pub fn rate_store(dir: &Path, clock: Arc<dyn Clock>) -> RateStore {
    RateStore::new(dir.join("rates.json"), dir.join("exchange_rates.json")).with_clock(clock)
}

pub fn coingecko(server: &MockServer, clock: Arc<dyn Clock>) -> CoinGeckoSource {
    CoinGeckoSource::new(code("USD"))
        .with_endpoint(format!("{}{}", server.uri(), COINGECKO_PATH))
        .with_clock(clock)
}

pub fn exchange_rate(server: &MockServer, clock: Arc<dyn Clock>) -> ExchangeRateSource {
    ExchangeRateSource::new(code("USD"))
        .with_endpoint(format!("{}{}", server.uri(), EXCHANGE_RATE_PATH))
        .with_clock(clock)
}

pub async fn mount_json(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/json"),
        )
        .mount(server)
        .await;
}
