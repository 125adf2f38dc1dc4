use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric user identifier, assigned as `max(existing) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Next id after the largest of `existing`, starting at 1.
    pub fn next_after(existing: impl IntoIterator<Item = UserId>) -> Self {
        let max = existing.into_iter().map(|id| id.0).max().unwrap_or(0);
        Self(max + 1)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
