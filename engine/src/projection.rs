use chrono::{DateTime, Duration, Utc};

use crate::policy::DurationPolicy;
use crate::types::ProjectedStake;

/// Seconds in the nominal staking year used for pro-rating.
pub const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Parse a user-typed amount: digits with at most one decimal point.
/// No signs, no exponents.
pub fn parse_amount(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty()
        || !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
        || trimmed.chars().filter(|c| *c == '.').count() > 1
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Project the payout for a not-yet-submitted stake.
///
/// `projected_reward = amount + amount * apr/100 * lock/year`, simple
/// non-compounding interest pro-rated over the lock duration. In test
/// mode the duration fraction is fixed at 1 so the artificially short
/// lock still produces a visible payout.
///
/// Invalid input projects zero rather than erroring: this feeds a
/// live-typing UI field, not a submission boundary. Pure and safe to
/// call on every keystroke.
pub fn project(
    amount_input: &str,
    policy: &DurationPolicy,
    test_mode: bool,
    now: DateTime<Utc>,
) -> ProjectedStake {
    let amount = parse_amount(amount_input).unwrap_or(0.0);
    project_amount(amount, policy, test_mode, now)
}

/// As [`project`], for an already-parsed amount.
pub fn project_amount(
    amount: f64,
    policy: &DurationPolicy,
    test_mode: bool,
    now: DateTime<Utc>,
) -> ProjectedStake {
    let duration_fraction = if test_mode {
        1.0
    } else {
        policy.lock_secs as f64 / SECONDS_PER_YEAR
    };
    let projected_reward = amount + amount * (policy.apr_percent / 100.0) * duration_fraction;

    ProjectedStake {
        amount,
        policy: policy.clone(),
        projected_reward,
        projected_unlock_at: now + Duration::seconds(policy.lock_secs as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DAY_SECS;

    fn thirty_days() -> DurationPolicy {
        DurationPolicy::new("30 Days", 15.0, 30 * DAY_SECS)
    }

    #[test]
    fn prorated_reward_for_thirty_days() {
        let now = Utc::now();
        let projected = project("1000", &thirty_days(), false, now);
        // 1000 + 1000 * 0.15 * (30/365) = 1012.3287...
        let expected = 1000.0 + 1000.0 * 0.15 * (30.0 / 365.0);
        assert!((projected.projected_reward - expected).abs() < 0.01);
        assert!((projected.projected_reward - 1012.33).abs() < 0.01);
    }

    #[test]
    fn test_mode_applies_full_apr_once() {
        let now = Utc::now();
        let policy = DurationPolicy::new("1 Minute", 15.0, 60);
        let projected = project("1000", &policy, true, now);
        // Flat apply: amount * (1 + APR), independent of the lock length.
        assert!((projected.projected_reward - 1150.0).abs() < 1e-9);
    }

    #[test]
    fn unlock_is_selection_time_plus_lock() {
        let now = Utc::now();
        let projected = project("500", &thirty_days(), false, now);
        assert_eq!(
            projected.projected_unlock_at,
            now + Duration::seconds((30 * DAY_SECS) as i64)
        );
    }

    #[test]
    fn invalid_input_projects_zero() {
        let now = Utc::now();
        for input in ["", "abc", "-5", "NaN", "inf", "1.2.3"] {
            let projected = project(input, &thirty_days(), false, now);
            assert_eq!(projected.amount, 0.0, "input {input:?}");
            assert_eq!(projected.projected_reward, 0.0, "input {input:?}");
        }
    }

    #[test]
    fn parse_accepts_plain_decimals_only() {
        assert_eq!(parse_amount("42"), Some(42.0));
        assert_eq!(parse_amount(" 3.5 "), Some(3.5));
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount("-1"), None);
        assert_eq!(parse_amount("+1"), None);
        assert_eq!(parse_amount("1e5"), None);
        assert_eq!(parse_amount("."), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn projection_is_idempotent() {
        let now = Utc::now();
        let a = project("1000", &thirty_days(), false, now);
        let b = project("1000", &thirty_days(), false, now);
        assert_eq!(a, b);
    }
}
