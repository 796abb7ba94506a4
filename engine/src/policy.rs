use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::PolicyError;

/// Seconds in one day.
pub const DAY_SECS: u64 = 86_400;

/// A staking duration offer: display label, APR, and lock length.
/// Valid only within the table (mode) it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationPolicy {
    /// Display label, e.g. "30 Days". Also the selection key.
    pub label: String,
    /// APR percentage, e.g. 15.0.
    pub apr_percent: f64,
    /// Lock length in seconds.
    pub lock_secs: u64,
}

impl DurationPolicy {
    pub fn new(label: impl Into<String>, apr_percent: f64, lock_secs: u64) -> Self {
        Self {
            label: label.into(),
            apr_percent,
            lock_secs,
        }
    }

    /// The lock length as a `Duration`.
    pub fn lock(&self) -> Duration {
        Duration::from_secs(self.lock_secs)
    }
}

/// An ordered label-keyed table of duration policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    policies: Vec<DurationPolicy>,
}

impl PolicyTable {
    pub fn new(policies: Vec<DurationPolicy>) -> Self {
        Self { policies }
    }

    /// Look up a policy by its display label.
    pub fn resolve(&self, label: &str) -> Option<&DurationPolicy> {
        self.policies.iter().find(|p| p.label == label)
    }

    /// The policies in display order.
    pub fn policies(&self) -> &[DurationPolicy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Both policy tables. Exactly one is active at a time, selected by the
/// contract-sourced `test_mode` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyBook {
    /// Tables offered in normal operation.
    pub normal: PolicyTable,
    /// The short-lock table used to exercise the full stake lifecycle
    /// quickly. Exactly one policy.
    pub test_mode: PolicyTable,
}

impl PolicyBook {
    /// The table selected by the current mode.
    pub fn active(&self, test_mode: bool) -> &PolicyTable {
        if test_mode {
            &self.test_mode
        } else {
            &self.normal
        }
    }

    /// Resolve a label against the active table.
    pub fn resolve(&self, label: &str, test_mode: bool) -> Result<&DurationPolicy, PolicyError> {
        self.active(test_mode)
            .resolve(label)
            .ok_or_else(|| PolicyError::UnknownDuration(label.to_string()))
    }

    /// Re-check a held selection after a mode swap. `None` means the label
    /// does not exist in the new table and the selection must be cleared.
    pub fn revalidate_selection(&self, label: &str, test_mode: bool) -> Option<&DurationPolicy> {
        self.active(test_mode).resolve(label)
    }
}

impl Default for PolicyBook {
    fn default() -> Self {
        Self {
            normal: PolicyTable::new(vec![
                DurationPolicy::new("30 Days", 15.0, 30 * DAY_SECS),
                DurationPolicy::new("6 Months", 24.0, 180 * DAY_SECS),
                DurationPolicy::new("1 Year", 36.0, 365 * DAY_SECS),
            ]),
            test_mode: PolicyTable::new(vec![DurationPolicy::new("1 Minute", 5.0, 60)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_labels() {
        let book = PolicyBook::default();
        let p = book.resolve("30 Days", false).unwrap();
        assert_eq!(p.apr_percent, 15.0);
        assert_eq!(p.lock_secs, 30 * DAY_SECS);

        let p = book.resolve("1 Year", false).unwrap();
        assert_eq!(p.apr_percent, 36.0);
        assert_eq!(p.lock_secs, 365 * DAY_SECS);
    }

    #[test]
    fn resolve_unknown_label_fails() {
        let book = PolicyBook::default();
        let result = book.resolve("2 Weeks", false);
        assert_eq!(
            result,
            Err(PolicyError::UnknownDuration("2 Weeks".to_string()))
        );
    }

    #[test]
    fn test_mode_table_has_one_short_policy() {
        let book = PolicyBook::default();
        assert_eq!(book.test_mode.len(), 1);
        let p = book.resolve("1 Minute", true).unwrap();
        assert_eq!(p.lock_secs, 60);
        assert!(p.apr_percent < 15.0);
    }

    #[test]
    fn normal_label_is_invalid_in_test_mode() {
        let book = PolicyBook::default();
        assert!(book.resolve("30 Days", true).is_err());
        assert!(book.resolve("1 Minute", false).is_err());
    }

    #[test]
    fn mode_swap_invalidates_selection() {
        let book = PolicyBook::default();
        // Selection made in normal mode survives within normal mode ...
        assert!(book.revalidate_selection("6 Months", false).is_some());
        // ... but must be cleared once test mode activates.
        assert!(book.revalidate_selection("6 Months", true).is_none());
    }

    #[test]
    fn normal_aprs_increase_with_lock_length() {
        let book = PolicyBook::default();
        let policies = book.normal.policies();
        for i in 1..policies.len() {
            assert!(policies[i].apr_percent > policies[i - 1].apr_percent);
            assert!(policies[i].lock_secs > policies[i - 1].lock_secs);
        }
    }

    #[test]
    fn serde_roundtrip() {
        let book = PolicyBook::default();
        let json = serde_json::to_string(&book).unwrap();
        let back: PolicyBook = serde_json::from_str(&json).unwrap();
        assert_eq!(book, back);
    }
}
