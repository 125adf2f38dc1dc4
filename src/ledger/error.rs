use rust_decimal::Decimal;

use crate::models::CurrencyCode;

/// Domain errors surfaced by ledger operations.
///
/// Everything except [`LedgerError::Storage`] is a caller mistake that can be
/// reported as-is; storage failures carry their `anyhow` context chain.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Insufficient funds: available {available} {currency}, required {required} {currency}")]
    InsufficientFunds {
        currency: CurrencyCode,
        available: Decimal,
        required: Decimal,
    },

    #[error("No {currency} wallet in portfolio")]
    WalletNotFound { currency: CurrencyCode },

    #[error("Username {username:?} is already taken")]
    DuplicateUsername { username: String },

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("User {username:?} not found")]
    UserNotFound { username: String },

    #[error("Unknown currency {code:?}")]
    CurrencyNotFound { code: String },

    #[error("Username must not be empty")]
    InvalidUsername,

    #[error("Password must be at least {min_len} characters")]
    InvalidPassword { min_len: usize },

    #[error("Depositing {amount} {currency} would overflow the wallet balance")]
    BalanceOverflow {
        currency: CurrencyCode,
        amount: Decimal,
    },

    #[error("Negative balance for {currency}")]
    NegativeBalance { currency: CurrencyCode },

    #[error("No rate available for {from} -> {to}")]
    RateUnavailable { from: CurrencyCode, to: CurrencyCode },

    #[error("No exchange rates cached; run update-rates first")]
    NoRates,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
