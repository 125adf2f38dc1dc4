//! User accounts, wallets and rate lookups on top of [`Storage`] and [`RateStore`].

mod error;

pub use error::LedgerError;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::models::{
    ensure_positive, validate_username, Currency, CurrencyCode, CurrencyRegistry, Portfolio,
    PortfolioValuation, User, UserId,
};
use crate::rates::{RateQuote, RateSnapshot, RateStore};
use crate::storage::Storage;

/// Result of a buy or sell.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub currency: CurrencyCode,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    /// Value of `amount` in the base currency, when a cached rate exists.
    pub estimated_value: Option<f64>,
    pub base: CurrencyCode,
}

/// A quote served from the cached snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLookup {
    pub quote: RateQuote,
    pub last_refresh: DateTime<Utc>,
    /// The snapshot is older than the configured TTL.
    pub stale: bool,
}

pub struct Ledger {
    storage: Arc<dyn Storage>,
    rates: RateStore,
    registry: CurrencyRegistry,
    /// Codes accepted in addition to the registry (configured rate currencies).
    extra_codes: BTreeSet<CurrencyCode>,
    base_currency: CurrencyCode,
    ttl: Duration,
}

impl Ledger {
    pub fn new(storage: Arc<dyn Storage>, rates: RateStore, base_currency: CurrencyCode) -> Self {
        Self {
            storage,
            rates,
            registry: CurrencyRegistry::builtin(),
            extra_codes: BTreeSet::new(),
            base_currency,
            ttl: Duration::from_secs(60 * 60),
        }
    }

    /// Ledger wired the way the config describes, accepting every configured
    /// rate currency alongside the built-in registry.
    pub fn from_config(
        config: &ResolvedConfig,
        storage: Arc<dyn Storage>,
        rates: RateStore,
    ) -> Self {
        let extra = config
            .rates
            .crypto_currencies
            .iter()
            .chain(&config.rates.fiat_currencies)
            .cloned();
        Self::new(storage, rates, config.base_currency.clone())
            .with_ttl(config.rates.ttl)
            .with_extra_codes(extra)
    }

    pub fn with_registry(mut self, registry: CurrencyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_extra_codes(mut self, codes: impl IntoIterator<Item = CurrencyCode>) -> Self {
        self.extra_codes.extend(codes);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn base_currency(&self) -> &CurrencyCode {
        &self.base_currency
    }

    pub fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }

    pub fn rate_store(&self) -> &RateStore {
        &self.rates
    }

    /// Registers a new user and an empty portfolio for them.
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<User, LedgerError> {
        let result = self.register_inner(username, password).await;
        log_action("REGISTER", username, None, None, &result);
        result
    }

    async fn register_inner(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<User, LedgerError> {
        let username = validate_username(username)?;
        if self.storage.find_user(&username).await?.is_some() {
            return Err(LedgerError::DuplicateUsername { username });
        }

        let users = self.storage.list_users().await?;
        let user_id = UserId::next_after(users.iter().map(|u| u.user_id));
        let user = User::new(user_id, &username, password, self.rates.clock().now())?;

        self.storage.save_user(&user).await?;
        self.storage.save_portfolio(&Portfolio::new(user_id)).await?;
        Ok(user)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<User, LedgerError> {
        let result = self.login_inner(username, password).await;
        log_action("LOGIN", username, None, None, &result);
        result
    }

    async fn login_inner(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<User, LedgerError> {
        let username = username.trim();
        let user = self
            .storage
            .find_user(username)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound {
                username: username.to_string(),
            })?;
        if !user.verify_password(password) {
            return Err(LedgerError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        Ok(self.storage.get_user(id).await?)
    }

    /// The user's portfolio; a missing record reads as an empty portfolio.
    pub async fn portfolio(&self, user_id: UserId) -> Result<Portfolio, LedgerError> {
        Ok(self
            .storage
            .get_portfolio(user_id)
            .await?
            .unwrap_or_else(|| Portfolio::new(user_id)))
    }

    pub fn get_currency(&self, code: &str) -> Result<&Currency, LedgerError> {
        let not_found = || LedgerError::CurrencyNotFound {
            code: code.trim().to_string(),
        };
        let code = CurrencyCode::parse(code).map_err(|_| not_found())?;
        self.registry.get(&code).ok_or_else(not_found)
    }

    /// Parses `code` and checks it against the registry and configured codes.
    pub fn resolve_code(&self, code: &str) -> Result<CurrencyCode, LedgerError> {
        let not_found = || LedgerError::CurrencyNotFound {
            code: code.trim().to_string(),
        };
        let parsed = CurrencyCode::parse(code).map_err(|_| not_found())?;
        if self.registry.contains(&parsed)
            || self.extra_codes.contains(&parsed)
            || parsed == self.base_currency
        {
            Ok(parsed)
        } else {
            Err(not_found())
        }
    }

    /// Deposits `amount` of `currency`, creating the wallet if needed.
    pub async fn buy(
        &self,
        user: &User,
        currency: &str,
        amount: Decimal,
    ) -> Result<TradeReceipt, LedgerError> {
        let result = self.buy_inner(user, currency, amount).await;
        log_action("BUY", &user.username, Some(currency), Some(amount), &result);
        result
    }

    async fn buy_inner(
        &self,
        user: &User,
        currency: &str,
        amount: Decimal,
    ) -> Result<TradeReceipt, LedgerError> {
        let code = self.resolve_code(currency)?;
        ensure_positive(amount)?;

        let mut portfolio = self.portfolio(user.user_id).await?;
        let wallet = portfolio.wallet_or_insert(&code);
        let balance_before = wallet.balance();
        wallet.deposit(amount)?;
        let balance_after = wallet.balance();
        self.storage.save_portfolio(&portfolio).await?;

        Ok(self.receipt(code, amount, balance_before, balance_after).await)
    }

    /// Withdraws `amount` of `currency` from an existing wallet.
    pub async fn sell(
        &self,
        user: &User,
        currency: &str,
        amount: Decimal,
    ) -> Result<TradeReceipt, LedgerError> {
        let result = self.sell_inner(user, currency, amount).await;
        log_action("SELL", &user.username, Some(currency), Some(amount), &result);
        result
    }

    async fn sell_inner(
        &self,
        user: &User,
        currency: &str,
        amount: Decimal,
    ) -> Result<TradeReceipt, LedgerError> {
        let code = self.resolve_code(currency)?;
        ensure_positive(amount)?;

        let mut portfolio = self.portfolio(user.user_id).await?;
        let wallet = portfolio
            .wallet_mut(&code)
            .ok_or_else(|| LedgerError::WalletNotFound {
                currency: code.clone(),
            })?;
        let balance_before = wallet.balance();
        wallet.withdraw(amount)?;
        let balance_after = wallet.balance();
        self.storage.save_portfolio(&portfolio).await?;

        Ok(self.receipt(code, amount, balance_before, balance_after).await)
    }

    async fn receipt(
        &self,
        currency: CurrencyCode,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
    ) -> TradeReceipt {
        // The trade itself never depends on rates being available.
        let snapshot = match self.rates.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to load rate snapshot for trade estimate");
                None
            }
        };
        let estimated_value = snapshot
            .and_then(|s| s.quote(&currency, &self.base_currency))
            .and_then(|q| amount.to_f64().map(|a| a * q.rate));

        TradeReceipt {
            currency,
            amount,
            balance_before,
            balance_after,
            estimated_value,
            base: self.base_currency.clone(),
        }
    }

    async fn snapshot(&self) -> Result<RateSnapshot, LedgerError> {
        self.rates.load_snapshot().await?.ok_or(LedgerError::NoRates)
    }

    /// Rate for `from -> to` from the cached snapshot.
    pub async fn get_rate(&self, from: &str, to: &str) -> Result<RateLookup, LedgerError> {
        let from = self.resolve_code(from)?;
        let to = self.resolve_code(to)?;
        let snapshot = self.snapshot().await?;

        let quote = snapshot
            .quote(&from, &to)
            .ok_or_else(|| LedgerError::RateUnavailable {
                from: from.clone(),
                to: to.clone(),
            })?;
        let stale = snapshot.is_stale(self.rates.clock().now(), self.ttl);
        if stale {
            warn!(
                last_refresh = %snapshot.last_refresh,
                "Cached rates are older than the configured TTL"
            );
        }

        Ok(RateLookup {
            quote,
            last_refresh: snapshot.last_refresh,
            stale,
        })
    }

    /// Values the user's portfolio in `base` (the configured base currency
    /// when `None`). Wallets without a rate count as zero.
    pub async fn portfolio_value(
        &self,
        user_id: UserId,
        base: Option<&str>,
    ) -> Result<PortfolioValuation, LedgerError> {
        let base = match base {
            Some(code) => self.resolve_code(code)?,
            None => self.base_currency.clone(),
        };
        let portfolio = self.portfolio(user_id).await?;
        let snapshot = self
            .rates
            .load_snapshot()
            .await?
            .unwrap_or_else(|| RateSnapshot::new(Default::default(), self.rates.clock().now()));

        Ok(portfolio.valuation(&base, |code| {
            let rate = snapshot.quote(code, &base).map(|q| q.rate);
            if rate.is_none() {
                warn!(currency = %code, base = %base, "No rate available; wallet valued at 0");
            }
            rate
        }))
    }
}

fn log_action<T>(
    action: &str,
    username: &str,
    currency: Option<&str>,
    amount: Option<Decimal>,
    result: &Result<T, LedgerError>,
) {
    let currency = currency.unwrap_or("-");
    let amount = amount.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
    match result {
        Ok(_) => info!(
            action,
            username,
            currency,
            amount = %amount,
            result = "OK",
            "Ledger action"
        ),
        Err(e) => info!(
            action,
            username,
            currency,
            amount = %amount,
            result = "ERROR",
            error = %e,
            "Ledger action"
        ),
    }
}
