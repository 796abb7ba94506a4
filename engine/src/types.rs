use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::DurationPolicy;

/// A single normalized stake position, owned by the reconciler snapshot.
///
/// Amounts are in display units (base units divided by the configured
/// token scale). `apr` is the percentage rate fixed at stake creation,
/// copied from chain, never recomputed locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Index of the record in the user's on-chain stake array.
    pub id: u64,
    /// Remaining staked amount in display units.
    pub principal: f64,
    /// APR percentage assigned at stake creation (e.g. 15.0).
    pub apr: f64,
    /// When the stake was created.
    pub created_at: DateTime<Utc>,
    /// When the principal unlocks without penalty.
    pub unlock_at: DateTime<Utc>,
    /// Chain-reported accrued/claimable reward in display units.
    pub rewards: f64,
    /// True once the rewards for this position have been claimed.
    pub claimed: bool,
    /// True once the principal has been withdrawn (no remaining principal).
    pub unstaked: bool,
}

impl StakePosition {
    /// A position stays in the active partition until fully unstaked.
    pub fn is_active(&self) -> bool {
        !self.unstaked
    }
}

/// Projection of a not-yet-submitted stake. Transient: recomputed on
/// every input change and discarded on submit or navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedStake {
    /// Parsed input amount in display units (0 when the input is invalid).
    pub amount: f64,
    /// The duration policy the projection was computed against.
    pub policy: DurationPolicy,
    /// Principal plus simple pro-rated interest over the lock duration.
    pub projected_reward: f64,
    /// Selection time plus the policy lock duration.
    pub projected_unlock_at: DateTime<Utc>,
}

/// Which actions are currently valid for a stake position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEligibility {
    /// Rewards are present and have not been claimed.
    pub can_claim: bool,
    /// Principal remains to withdraw.
    pub can_unstake: bool,
    /// Unstaking now is allowed but incurs the early-unstake penalty;
    /// explicit user confirmation is required first.
    pub early_penalty_warning: bool,
}

/// Errors produced while normalizing raw chain records.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed stake record at index {index}: {reason}")]
    MalformedRecord { index: u64, reason: String },
}

impl NormalizeError {
    pub fn malformed(index: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }
}

/// Errors produced while resolving duration policies.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("no staking duration named {0:?} in the active table")]
    UnknownDuration(String),
}
