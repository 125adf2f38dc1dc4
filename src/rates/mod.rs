mod lookup;
mod models;
mod provider;
pub mod providers;
mod store;
mod updater;

pub use lookup::{QuoteRoute, RateFilter, RateQuote, RateRow};
pub use models::{
    timestamp, HistoryEntry, InvalidRate, PairId, PairIdError, RateRecord, RateSet, RateSnapshot,
};
pub use provider::{ApiErrorKind, ApiRequestError, RateProvider};
pub use providers::build_providers;
pub use store::RateStore;
pub use updater::{EmptyUpdatePolicy, ProviderOutcome, ProviderStatus, RateUpdater, UpdateReport};
