use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wallet::WalletRecord;
use super::{CurrencyCode, UserId, Wallet};
use crate::ledger::LedgerError;

/// All wallets owned by one user, keyed by currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PortfolioRecord", into = "PortfolioRecord")]
pub struct Portfolio {
    user_id: UserId,
    wallets: BTreeMap<CurrencyCode, Wallet>,
}

/// Shape of one element of `portfolios.json`:
/// `{"user_id": 1, "wallets": {"BTC": {"balance": 0.5}}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PortfolioRecord {
    user_id: UserId,
    #[serde(default)]
    wallets: BTreeMap<CurrencyCode, WalletRecord>,
}

/// Base-currency value of a portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub base: CurrencyCode,
    pub lines: Vec<ValuationLine>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuationLine {
    pub currency: CurrencyCode,
    pub balance: Decimal,
    /// `None` when no rate to the base currency was available.
    pub value_in_base: Option<f64>,
}

impl Portfolio {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    pub fn wallet(&self, code: &CurrencyCode) -> Option<&Wallet> {
        self.wallets.get(code)
    }

    pub fn wallet_mut(&mut self, code: &CurrencyCode) -> Option<&mut Wallet> {
        self.wallets.get_mut(code)
    }

    /// Returns the wallet for `code`, creating an empty one if needed.
    pub fn wallet_or_insert(&mut self, code: &CurrencyCode) -> &mut Wallet {
        self.wallets
            .entry(code.clone())
            .or_insert_with(|| Wallet::new(code.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Values every wallet in `base` using `rate_to_base`, which returns the
    /// price of one unit of the given currency in `base`.
    ///
    /// Wallets without a rate contribute nothing to the total.
    pub fn valuation(
        &self,
        base: &CurrencyCode,
        mut rate_to_base: impl FnMut(&CurrencyCode) -> Option<f64>,
    ) -> PortfolioValuation {
        let mut total = 0.0;
        let lines = self
            .wallets
            .values()
            .map(|wallet| {
                let balance = wallet.balance();
                let value_in_base = rate_to_base(wallet.currency_code())
                    .and_then(|rate| balance.to_f64().map(|b| b * rate));
                if let Some(value) = value_in_base {
                    total += value;
                }
                ValuationLine {
                    currency: wallet.currency_code().clone(),
                    balance,
                    value_in_base,
                }
            })
            .collect();

        PortfolioValuation {
            base: base.clone(),
            lines,
            total,
        }
    }
}

impl TryFrom<PortfolioRecord> for Portfolio {
    type Error = LedgerError;

    fn try_from(record: PortfolioRecord) -> Result<Self, Self::Error> {
        let mut wallets = BTreeMap::new();
        for (code, wallet) in record.wallets {
            let wallet = Wallet::with_balance(code.clone(), wallet.balance)?;
            wallets.insert(code, wallet);
        }
        Ok(Self {
            user_id: record.user_id,
            wallets,
        })
    }
}

impl From<Portfolio> for PortfolioRecord {
    fn from(portfolio: Portfolio) -> Self {
        Self {
            user_id: portfolio.user_id,
            wallets: portfolio
                .wallets
                .iter()
                .map(|(code, wallet)| (code.clone(), wallet.to_record()))
                .collect(),
        }
    }
}
