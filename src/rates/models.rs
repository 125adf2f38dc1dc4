use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::CurrencyCode;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid pair id {value:?}: expected FROM_TO with 2-5 upper-case letters on each side")]
pub struct PairIdError {
    value: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Invalid rate {rate}: rates must be finite and greater than zero")]
pub struct InvalidRate {
    pub rate: f64,
}

fn pair_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{2,5}_[A-Z]{2,5}$").expect("static regex"))
}

/// One-directional exchange pair, written `FROM_TO` (e.g. `BTC_USD`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairId {
    from: CurrencyCode,
    to: CurrencyCode,
}

impl PairId {
    pub fn new(from: CurrencyCode, to: CurrencyCode) -> Self {
        Self { from, to }
    }

    pub fn from_currency(&self) -> &CurrencyCode {
        &self.from
    }

    pub fn to_currency(&self) -> &CurrencyCode {
        &self.to
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.to.clone(), self.from.clone())
    }

    pub fn is_valid(value: &str) -> bool {
        pair_id_pattern().is_match(value)
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.from, self.to)
    }
}

impl FromStr for PairId {
    type Err = PairIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PairIdError {
            value: s.to_string(),
        };
        if !Self::is_valid(s) {
            return Err(err());
        }
        let (from, to) = s.split_once('_').ok_or_else(err)?;
        Ok(Self {
            from: CurrencyCode::parse(from).map_err(|_| err())?,
            to: CurrencyCode::parse(to).map_err(|_| err())?,
        })
    }
}

impl TryFrom<String> for PairId {
    type Error = PairIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PairId> for String {
    fn from(pair: PairId) -> Self {
        pair.to_string()
    }
}

/// Latest observation of a pair. The pair id itself is the key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

impl RateRecord {
    pub fn new(
        rate: f64,
        updated_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Result<Self, InvalidRate> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(InvalidRate { rate });
        }
        Ok(Self {
            rate,
            updated_at,
            source: source.into(),
        })
    }
}

/// Rates keyed by pair. Ordered so serialized output is stable.
pub type RateSet = BTreeMap<PairId, RateRecord>;

/// Contents of the snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub pairs: RateSet,
    pub last_refresh: DateTime<Utc>,
    /// Set when an update cycle ran but left the previous pairs in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
}

impl RateSnapshot {
    pub fn new(pairs: RateSet, last_refresh: DateTime<Utc>) -> Self {
        Self {
            pairs,
            last_refresh,
            last_attempt: None,
        }
    }

    pub fn get(&self, pair: &PairId) -> Option<&RateRecord> {
        self.pairs.get(pair)
    }

    /// True when `last_refresh` is older than `ttl` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.last_refresh > ttl,
            Err(_) => false,
        }
    }
}

/// One line of the append-only history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

impl HistoryEntry {
    /// Builds the entry for `pair`, with id `<PAIR>_<updated_at>`.
    pub fn from_record(pair: &PairId, record: &RateRecord) -> Self {
        Self {
            id: format!("{pair}_{}", timestamp(record.updated_at)),
            from_currency: pair.from.clone(),
            to_currency: pair.to.clone(),
            rate: record.rate,
            updated_at: record.updated_at,
            source: record.source.clone(),
        }
    }
}

/// RFC 3339 rendering used for ids and display, e.g. `2024-05-01T12:00:00Z`.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
