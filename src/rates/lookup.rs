use chrono::{DateTime, Utc};

use super::{PairId, RateSnapshot};
use crate::models::CurrencyCode;

/// A resolved conversion rate between two currencies.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: f64,
    /// Oldest `updated_at` among the records used. `None` for identity quotes.
    pub updated_at: Option<DateTime<Utc>>,
    pub route: QuoteRoute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteRoute {
    Identity,
    Direct,
    Inverse,
    /// Converted through an intermediate currency.
    Cross(CurrencyCode),
}

/// Options for [`RateSnapshot::rows`].
#[derive(Debug, Clone, Default)]
pub struct RateFilter {
    /// Keep pairs where either code starts with this prefix.
    pub currency: Option<String>,
    pub top: Option<usize>,
    pub base: Option<CurrencyCode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub pair: PairId,
    pub rate: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RateSnapshot {
    /// Resolves `from -> to` from the cached pairs.
    ///
    /// Tries, in order: same currency, the direct pair, the inverse pair,
    /// then a single hop through any currency both sides are quoted against.
    pub fn quote(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<RateQuote> {
        if from == to {
            return Some(RateQuote {
                from: from.clone(),
                to: to.clone(),
                rate: 1.0,
                updated_at: None,
                route: QuoteRoute::Identity,
            });
        }

        if let Some((rate, updated_at, route)) = self.one_hop(from, to) {
            return Some(RateQuote {
                from: from.clone(),
                to: to.clone(),
                rate,
                updated_at: Some(updated_at),
                route,
            });
        }

        for via in self.currencies() {
            if via == from || via == to {
                continue;
            }
            let Some((first, first_at, _)) = self.one_hop(from, via) else {
                continue;
            };
            let Some((second, second_at, _)) = self.one_hop(via, to) else {
                continue;
            };
            return Some(RateQuote {
                from: from.clone(),
                to: to.clone(),
                rate: first * second,
                updated_at: Some(first_at.min(second_at)),
                route: QuoteRoute::Cross(via.clone()),
            });
        }

        None
    }

    fn one_hop(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Option<(f64, DateTime<Utc>, QuoteRoute)> {
        let pair = PairId::new(from.clone(), to.clone());
        if let Some(record) = self.pairs.get(&pair) {
            return Some((record.rate, record.updated_at, QuoteRoute::Direct));
        }
        self.pairs
            .get(&pair.inverse())
            .map(|record| (1.0 / record.rate, record.updated_at, QuoteRoute::Inverse))
    }

    /// Rows for a rate listing.
    ///
    /// With `filter.base` set, every cached currency is quoted against that
    /// base; otherwise the stored pairs are listed as-is. `top` keeps the N
    /// highest rates.
    pub fn rows(&self, filter: &RateFilter) -> Vec<RateRow> {
        let mut rows: Vec<RateRow> = match &filter.base {
            Some(base) => self
                .currencies()
                .into_iter()
                .filter(|code| *code != base)
                .filter_map(|code| self.quote(code, base))
                .map(|quote| RateRow {
                    pair: PairId::new(quote.from, quote.to),
                    rate: quote.rate,
                    updated_at: quote.updated_at,
                })
                .collect(),
            None => self
                .pairs
                .iter()
                .map(|(pair, record)| RateRow {
                    pair: pair.clone(),
                    rate: record.rate,
                    updated_at: Some(record.updated_at),
                })
                .collect(),
        };

        if let Some(prefix) = &filter.currency {
            let prefix = prefix.trim().to_ascii_uppercase();
            rows.retain(|row| {
                row.pair.from_currency().as_str().starts_with(&prefix)
                    || row.pair.to_currency().as_str().starts_with(&prefix)
            });
        }

        if let Some(top) = filter.top {
            rows.sort_by(|a, b| b.rate.total_cmp(&a.rate));
            rows.truncate(top);
        }
        rows
    }

    /// Every currency appearing on either side of a cached pair, sorted.
    fn currencies(&self) -> Vec<&CurrencyCode> {
        let mut codes: Vec<&CurrencyCode> = self
            .pairs
            .keys()
            .flat_map(|pair| [pair.from_currency(), pair.to_currency()])
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }
}
