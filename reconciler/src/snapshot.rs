use serde::{Deserialize, Serialize};

use stakeview_engine::StakePosition;

/// The published active/historical partition of a user's stakes.
///
/// Owned exclusively by the reconciler and replaced wholesale on every
/// successful cycle; readers get clones of a point-in-time state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Positions with principal still staked.
    pub active: Vec<StakePosition>,
    /// Fully unstaked positions.
    pub historical: Vec<StakePosition>,
}

impl LedgerSnapshot {
    /// Partition normalized positions solely by the `unstaked` predicate.
    pub fn partition(positions: Vec<StakePosition>) -> Self {
        let (historical, active) = positions.into_iter().partition(|p| p.unstaked);
        Self { active, historical }
    }

    /// Derived alongside the snapshot it describes, never set independently.
    pub fn has_active_stakes(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.historical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.historical.is_empty()
    }

    /// Look up a position in either partition by its on-chain id.
    pub fn position(&self, id: u64) -> Option<&StakePosition> {
        self.active
            .iter()
            .chain(self.historical.iter())
            .find(|p| p.id == id)
    }
}
