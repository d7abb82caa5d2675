//! Lock state of a single identifier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an identifier is currently locked out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    /// Credentials may be checked
    Unlocked,
    /// Credentials must not be checked before `until`
    Locked {
        /// When the lock expires
        until: DateTime<Utc>,
    },
}

impl LockState {
    /// Whether this is [`LockState::Locked`]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// Whole minutes until the lock expires, rounded up; 0 when unlocked
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        match self {
            Self::Unlocked => 0,
            Self::Locked { until } => {
                let secs = (*until - now).num_seconds().max(0);
                (secs + 59) / 60
            }
        }
    }
}
