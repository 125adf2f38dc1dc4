mod currency;
mod id;
mod portfolio;
mod user;
mod wallet;

pub use currency::{Currency, CurrencyCode, CurrencyCodeError, CurrencyRegistry};
pub use id::UserId;
pub use portfolio::{Portfolio, PortfolioValuation, ValuationLine};
pub use user::{hash_password, validate_username, User, MIN_PASSWORD_LEN};
pub use wallet::Wallet;

pub(crate) use wallet::ensure_positive;
