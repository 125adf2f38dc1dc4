use std::fmt;

use super::providers::{CoinGeckoSource, ExchangeRateSource};
use super::RateSet;

/// Why a provider call produced no rates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The provider answered with a non-success HTTP status.
    Status { status: u16, body: String },
    /// The request never completed (DNS, connect, TLS, timeout).
    Network(String),
    /// The body was not the JSON shape the provider promises.
    Malformed(String),
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Status { status, body } if body.is_empty() => write!(f, "HTTP {status}"),
            ApiErrorKind::Status { status, body } => write!(f, "HTTP {status} - {body}"),
            ApiErrorKind::Network(msg) => write!(f, "network error: {msg}"),
            ApiErrorKind::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{provider} request failed: {kind}")]
pub struct ApiRequestError {
    pub provider: String,
    pub kind: ApiErrorKind,
}

impl ApiRequestError {
    pub fn new(provider: impl Into<String>, kind: ApiErrorKind) -> Self {
        Self {
            provider: provider.into(),
            kind,
        }
    }
}

/// The rate providers the updater knows how to call.
///
/// Each variant makes exactly one HTTP request per `fetch_rates` call and
/// never retries.
#[derive(Debug, Clone)]
pub enum RateProvider {
    Crypto(CoinGeckoSource),
    Fiat(ExchangeRateSource),
}

impl RateProvider {
    pub async fn fetch_rates(&self) -> Result<RateSet, ApiRequestError> {
        match self {
            RateProvider::Crypto(source) => source.fetch_rates().await,
            RateProvider::Fiat(source) => source.fetch_rates().await,
        }
    }

    /// Short name used on the command line and in logs.
    pub fn name(&self) -> &str {
        match self {
            RateProvider::Crypto(source) => source.name(),
            RateProvider::Fiat(source) => source.name(),
        }
    }
}

impl From<CoinGeckoSource> for RateProvider {
    fn from(source: CoinGeckoSource) -> Self {
        RateProvider::Crypto(source)
    }
}

impl From<ExchangeRateSource> for RateProvider {
    fn from(source: ExchangeRateSource) -> Self {
        RateProvider::Fiat(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ApiRequestError::new(
            "coingecko",
            ApiErrorKind::Status {
                status: 429,
                body: "rate limited".to_string(),
            },
        );
        assert_eq!(err.to_string(), "coingecko request failed: HTTP 429 - rate limited");

        let err = ApiRequestError::new(
            "exchangerate",
            ApiErrorKind::Malformed("missing rates".into()),
        );
        assert_eq!(
            err.to_string(),
            "exchangerate request failed: malformed response: missing rates"
        );
    }
}
