use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::CurrencyCode;
use crate::ledger::LedgerError;

/// Holdings of a single currency. The balance never goes negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    currency_code: CurrencyCode,
    balance: Decimal,
}

/// On-disk shape of a wallet inside `portfolios.json`; the code is the map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WalletRecord {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

impl Wallet {
    pub fn new(currency_code: CurrencyCode) -> Self {
        Self {
            currency_code,
            balance: Decimal::ZERO,
        }
    }

    pub fn with_balance(
        currency_code: CurrencyCode,
        balance: Decimal,
    ) -> Result<Self, LedgerError> {
        if balance < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance {
                currency: currency_code,
            });
        }
        Ok(Self {
            currency_code,
            balance,
        })
    }

    pub fn currency_code(&self) -> &CurrencyCode {
        &self.currency_code
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount)?;
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                currency: self.currency_code.clone(),
                amount,
            })?;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount)?;
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                currency: self.currency_code.clone(),
                available: self.balance,
                required: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub(crate) fn to_record(&self) -> WalletRecord {
        WalletRecord {
            balance: self.balance,
        }
    }
}

pub(crate) fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> CurrencyCode {
        CurrencyCode::parse("BTC").unwrap()
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut wallet = Wallet::new(btc());
        wallet.deposit(dec!(1.5)).unwrap();
        wallet.withdraw(dec!(0.25)).unwrap();
        assert_eq!(wallet.balance(), dec!(1.25));
    }

    #[test]
    fn test_withdraw_more_than_balance_fails() {
        let mut wallet = Wallet::with_balance(btc(), dec!(5)).unwrap();
        let err = wallet.withdraw(dec!(10)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(wallet.balance(), dec!(5));
    }

    #[test]
    fn test_withdraw_entire_balance_is_allowed() {
        let mut wallet = Wallet::with_balance(btc(), dec!(0.3)).unwrap();
        wallet.withdraw(dec!(0.3)).unwrap();
        assert!(wallet.balance().is_zero());
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut wallet = Wallet::new(btc());
        assert!(matches!(
            wallet.deposit(Decimal::ZERO),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            wallet.withdraw(dec!(-1)),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_deposit_overflow_is_an_error() {
        let mut wallet = Wallet::new(btc());
        wallet.deposit(Decimal::MAX).unwrap();

        let err = wallet.deposit(Decimal::MAX).unwrap_err();
        assert!(matches!(err, LedgerError::BalanceOverflow { .. }));
        assert_eq!(wallet.balance(), Decimal::MAX);
    }

    #[test]
    fn test_negative_starting_balance_rejected() {
        assert!(Wallet::with_balance(btc(), dec!(-0.01)).is_err());
    }

    #[test]
    fn test_record_serializes_balance_as_number() {
        let wallet = Wallet::with_balance(btc(), dec!(0.1)).unwrap();
        let json = serde_json::to_string(&wallet.to_record()).unwrap();
        assert_eq!(json, r#"{"balance":0.1}"#);
    }
}
