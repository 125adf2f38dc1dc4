use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid currency code {value:?}: codes must be 2-5 ASCII letters")]
pub struct CurrencyCodeError {
    value: String,
}

/// Upper-case currency code such as `USD` or `BTC`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Validates and upper-cases `value`. Surrounding whitespace is ignored.
    pub fn parse(value: &str) -> Result<Self, CurrencyCodeError> {
        let trimmed = value.trim();
        let valid = (2..=5).contains(&trimmed.len())
            && trimmed.chars().all(|c| c.is_ascii_alphabetic());
        if !valid {
            return Err(CurrencyCodeError {
                value: value.to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// For upper-case literals such as config defaults.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(CurrencyCode::parse(value).is_ok_and(|c| c.0 == value));
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Descriptive information about a currency the wallet knows how to hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Currency {
    Fiat {
        code: CurrencyCode,
        name: String,
        issuing_country: String,
    },
    Crypto {
        code: CurrencyCode,
        name: String,
        algorithm: String,
        market_cap: f64,
    },
}

impl Currency {
    pub fn code(&self) -> &CurrencyCode {
        match self {
            Currency::Fiat { code, .. } | Currency::Crypto { code, .. } => code,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Currency::Fiat { name, .. } | Currency::Crypto { name, .. } => name,
        }
    }

    /// One-line description used by listings.
    pub fn display_info(&self) -> String {
        match self {
            Currency::Fiat {
                code,
                name,
                issuing_country,
            } => format!("[FIAT] {code} - {name} (Issuing: {issuing_country})"),
            Currency::Crypto {
                code,
                name,
                algorithm,
                market_cap,
            } => format!("[CRYPTO] {code} - {name} (Algo: {algorithm}, MCAP: {market_cap:.2e})"),
        }
    }
}

/// Set of currencies accepted by the ledger.
#[derive(Debug, Clone, Default)]
pub struct CurrencyRegistry {
    currencies: BTreeMap<CurrencyCode, Currency>,
}

impl CurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the currencies the default rate providers cover.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (code, name, country) in [
            ("USD", "US Dollar", "United States"),
            ("EUR", "Euro", "Eurozone"),
            ("GBP", "British Pound", "United Kingdom"),
            ("RUB", "Russian Ruble", "Russia"),
        ] {
            registry.insert(Currency::Fiat {
                code: CurrencyCode(code.to_string()),
                name: name.to_string(),
                issuing_country: country.to_string(),
            });
        }
        for (code, name, algorithm, market_cap) in [
            ("BTC", "Bitcoin", "SHA-256", 1.12e12),
            ("ETH", "Ethereum", "Ethash", 5.0e11),
            ("SOL", "Solana", "Proof of History", 6.5e10),
        ] {
            registry.insert(Currency::Crypto {
                code: CurrencyCode(code.to_string()),
                name: name.to_string(),
                algorithm: algorithm.to_string(),
                market_cap,
            });
        }
        registry
    }

    pub fn insert(&mut self, currency: Currency) {
        self.currencies.insert(currency.code().clone(), currency);
    }

    pub fn get(&self, code: &CurrencyCode) -> Option<&Currency> {
        self.currencies.get(code)
    }

    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.currencies.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }
}
