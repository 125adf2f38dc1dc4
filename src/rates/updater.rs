use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{HistoryEntry, RateProvider, RateSet, RateSnapshot, RateStore};

/// What to do with the snapshot when a cycle collects no rates at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyUpdatePolicy {
    /// Write an empty snapshot with a fresh `last_refresh`.
    #[default]
    Overwrite,
    /// Leave the previous pairs in place and only stamp `last_attempt`.
    KeepPrevious,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Ok { rates: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOutcome {
    pub provider: String,
    pub status: ProviderStatus,
}

/// Summary of one update cycle.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub outcomes: Vec<ProviderOutcome>,
    /// Number of history entries appended (one per merged pair).
    pub history_appended: usize,
    /// False when the cycle was empty and the previous snapshot was kept.
    pub snapshot_replaced: bool,
    pub snapshot: RateSnapshot,
}

impl UpdateReport {
    pub fn failed_providers(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ProviderStatus::Failed { .. }))
    }
}

/// Runs providers in order, merges their rates and persists the result.
pub struct RateUpdater<'a> {
    providers: Vec<RateProvider>,
    store: &'a RateStore,
    on_empty: EmptyUpdatePolicy,
}

impl<'a> RateUpdater<'a> {
    pub fn new(providers: Vec<RateProvider>, store: &'a RateStore) -> Self {
        Self {
            providers,
            store,
            on_empty: EmptyUpdatePolicy::default(),
        }
    }

    pub fn with_empty_policy(mut self, policy: EmptyUpdatePolicy) -> Self {
        self.on_empty = policy;
        self
    }

    /// Restricts the cycle to the provider called `name`. Returns `None`
    /// when no configured provider has that name.
    pub fn only(mut self, name: &str) -> Option<Self> {
        self.providers.retain(|p| p.name() == name);
        if self.providers.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// One update cycle.
    ///
    /// Providers run one after another. A provider failure is logged and
    /// recorded in the report but never aborts the cycle; later providers
    /// overwrite earlier ones on the same pair. Store I/O errors do abort.
    pub async fn run_update(&self) -> Result<UpdateReport> {
        let mut merged = RateSet::new();
        let mut outcomes = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name();
            info!(provider = %name, "Fetching rates");

            let status = match provider.fetch_rates().await {
                Ok(rates) => {
                    info!(provider = %name, count = rates.len(), "Fetched rates");
                    let count = rates.len();
                    merged.extend(rates);
                    ProviderStatus::Ok { rates: count }
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Failed to fetch rates");
                    ProviderStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(ProviderOutcome {
                provider: name.to_string(),
                status,
            });
        }

        let entries: Vec<HistoryEntry> = merged
            .iter()
            .map(|(pair, record)| HistoryEntry::from_record(pair, record))
            .collect();
        self.store.append_history_batch(&entries).await?;

        let (snapshot, snapshot_replaced) =
            if merged.is_empty() && self.on_empty == EmptyUpdatePolicy::KeepPrevious {
                warn!("No rates fetched; keeping previous snapshot");
                (self.store.record_attempt().await?, false)
            } else {
                if merged.is_empty() {
                    warn!("No rates fetched; writing empty snapshot");
                }
                (self.store.replace_snapshot(merged).await?, true)
            };

        info!(
            pairs = snapshot.pairs.len(),
            history_appended = entries.len(),
            "Rate update finished"
        );

        Ok(UpdateReport {
            outcomes,
            history_appended: entries.len(),
            snapshot_replaced,
            snapshot,
        })
    }
}
