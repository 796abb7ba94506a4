use chrono::{DateTime, Utc};

use crate::types::{ActionEligibility, StakePosition};

/// Fixed penalty rate (percent) charged when principal is withdrawn
/// before the unlock time.
pub const EARLY_UNSTAKE_PENALTY_PERCENT: f64 = 6.0;

/// Decide which actions are currently valid for a position.
///
/// Stateless and recomputed on every read: `now` advances independently
/// of reconciliation cycles, so the result must never be cached on the
/// position itself.
pub fn eligibility(position: &StakePosition, now: DateTime<Utc>) -> ActionEligibility {
    ActionEligibility {
        can_claim: position.rewards > 0.0 && !position.claimed,
        can_unstake: position.principal > 0.0,
        early_penalty_warning: now < position.unlock_at,
    }
}
