use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use stakeview_chain::RawStakeRecord;

use crate::types::{NormalizeError, StakePosition};

/// Convert a base-unit integer amount to display units at the given scale.
pub fn to_display_units(base_units: u128, decimals: u32) -> f64 {
    base_units as f64 / 10f64.powi(decimals as i32)
}

/// Parse a display-unit decimal string straight into base units,
/// digit-wise, without going through floating point. Fractional digits
/// beyond the configured scale don't have a base-unit representation
/// and are rejected, as is anything but digits and one decimal point.
pub fn parse_base_units(input: &str, decimals: u32) -> Option<u128> {
    let trimmed = input.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if frac.len() > decimals as usize {
        return None;
    }

    let scale = 10u128.checked_pow(decimals)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().ok()?
    };
    let frac_units = if frac.is_empty() {
        0
    } else {
        frac.parse::<u128>().ok()? * 10u128.pow(decimals - frac.len() as u32)
    };
    whole_units.checked_mul(scale)?.checked_add(frac_units)
}

/// Normalize one raw on-chain stake record into a typed position.
///
/// All amount fields are interpreted at the same fixed base-unit scale.
/// Missing or non-numeric required fields fail with `MalformedRecord`;
/// the caller excludes the record and reports it instead of aborting
/// the whole batch.
pub fn normalize(
    record: &RawStakeRecord,
    index: u64,
    decimals: u32,
) -> Result<StakePosition, NormalizeError> {
    let principal_base = amount_field(record, "stakedAmount", index)?;
    let rewards_base = amount_field(record, "rewards", index)?;
    let apr = rate_field(record, "APR", index)?;
    let created_at = timestamp_field(record, "stakeStart", index)?;
    let unlock_at = timestamp_field(record, "stakeEnd", index)?;
    let claimed = bool_field(record, "claimed", index)?;

    if unlock_at < created_at {
        return Err(NormalizeError::malformed(
            index,
            "stakeEnd precedes stakeStart",
        ));
    }

    Ok(StakePosition {
        id: index,
        principal: to_display_units(principal_base, decimals),
        apr,
        created_at,
        unlock_at,
        rewards: to_display_units(rewards_base, decimals),
        claimed,
        unstaked: principal_base == 0,
    })
}

/// Normalize a full fetch. Malformed records are skipped and reported;
/// one bad entry never hides the user's other stakes.
pub fn normalize_all(
    records: &[RawStakeRecord],
    decimals: u32,
) -> (Vec<StakePosition>, Vec<NormalizeError>) {
    let mut positions = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match normalize(record, index as u64, decimals) {
            Ok(position) => positions.push(position),
            Err(error) => {
                warn!(index, %error, "skipping malformed stake record");
                errors.push(error);
            }
        }
    }

    (positions, errors)
}

fn field<'a>(record: &'a Value, name: &str, index: u64) -> Result<&'a Value, NormalizeError> {
    record
        .get(name)
        .ok_or_else(|| NormalizeError::malformed(index, format!("missing field {name:?}")))
}

/// Base-unit amounts arrive as decimal strings (they exceed JSON number
/// precision at 18 decimals) but small integers are tolerated too.
fn amount_field(record: &Value, name: &str, index: u64) -> Result<u128, NormalizeError> {
    let value = field(record, name, index)?;
    let parsed = match value {
        Value::String(s) => s.trim().parse::<u128>().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    };
    parsed.ok_or_else(|| {
        NormalizeError::malformed(index, format!("field {name:?} is not a base-unit integer"))
    })
}

fn rate_field(record: &Value, name: &str, index: u64) -> Result<f64, NormalizeError> {
    let value = field(record, name, index)?;
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    match parsed {
        Some(rate) if rate.is_finite() && rate >= 0.0 => Ok(rate),
        _ => Err(NormalizeError::malformed(
            index,
            format!("field {name:?} is not a non-negative rate"),
        )),
    }
}

fn timestamp_field(record: &Value, name: &str, index: u64) -> Result<DateTime<Utc>, NormalizeError> {
    let value = field(record, name, index)?;
    let secs = match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .ok_or_else(|| {
            NormalizeError::malformed(index, format!("field {name:?} is not a unix timestamp"))
        })
}

fn bool_field(record: &Value, name: &str, index: u64) -> Result<bool, NormalizeError> {
    field(record, name, index)?.as_bool().ok_or_else(|| {
        NormalizeError::malformed(index, format!("field {name:?} is not a boolean"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WEI: u128 = 1_000_000_000_000_000_000;

    fn raw(staked: &str, rewards: &str, claimed: bool) -> Value {
        json!({
            "stakedAmount": staked,
            "APR": 15.0,
            "stakeStart": 1_700_000_000,
            "stakeEnd": 1_702_592_000,
            "rewards": rewards,
            "claimed": claimed,
        })
    }

    #[test]
    fn one_display_unit_round_trips_without_drift() {
        let display = to_display_units(WEI, 18);
        assert_eq!(display, 1.0);
        assert_eq!(parse_base_units("1", 18), Some(WEI));
        assert_eq!(parse_base_units("1.0", 18), Some(WEI));
    }

    #[test]
    fn scale_respects_configured_decimals() {
        assert_eq!(to_display_units(1_500_000, 6), 1.5);
        assert_eq!(parse_base_units("1.5", 6), Some(1_500_000));
        assert_eq!(parse_base_units(".5", 6), Some(500_000));
        assert_eq!(parse_base_units("2.", 6), Some(2_000_000));
    }

    #[test]
    fn long_fractional_input_parses_without_drift() {
        // 0.123456789012345678 tokens is not representable in f64 but
        // must land on the exact base-unit integer.
        assert_eq!(
            parse_base_units("0.123456789012345678", 18),
            Some(123_456_789_012_345_678)
        );
        assert_eq!(
            parse_base_units("1000000.000000000000000001", 18),
            Some(1_000_000_000_000_000_000_000_001)
        );
    }

    #[test]
    fn sub_base_unit_precision_is_rejected() {
        // 19 fractional digits at an 18-decimal scale.
        assert_eq!(parse_base_units("0.0000000000000000001", 18), None);
        assert_eq!(parse_base_units("1.5000001", 6), None);
    }

    #[test]
    fn non_decimal_amount_input_is_rejected() {
        for input in ["", ".", "1.2.3", "-1", "+1", "1e18", "abc", "1 000"] {
            assert_eq!(parse_base_units(input, 18), None, "input {input:?}");
        }
    }

    #[test]
    fn normalizes_a_well_formed_record() {
        let record = raw("2000000000000000000", "87420000000000000", false);
        let position = normalize(&record, 3, 18).unwrap();
        assert_eq!(position.id, 3);
        assert_eq!(position.principal, 2.0);
        assert_eq!(position.apr, 15.0);
        assert!((position.rewards - 0.08742).abs() < 1e-12);
        assert!(!position.claimed);
        assert!(!position.unstaked);
        assert!(position.unlock_at > position.created_at);
    }

    #[test]
    fn zero_principal_is_unstaked() {
        let record = raw("0", "0", true);
        let position = normalize(&record, 0, 18).unwrap();
        assert!(position.unstaked);
        assert!(!position.is_active());
    }

    #[test]
    fn numeric_amounts_are_tolerated() {
        let record = json!({
            "stakedAmount": 1_000_000u64,
            "APR": "10",
            "stakeStart": "1700000000",
            "stakeEnd": 1_700_000_060i64,
            "rewards": 0,
            "claimed": false,
        });
        let position = normalize(&record, 0, 6).unwrap();
        assert_eq!(position.principal, 1.0);
        assert_eq!(position.apr, 10.0);
    }

    #[test]
    fn missing_field_is_malformed() {
        let mut record = raw("1", "0", false);
        record.as_object_mut().unwrap().remove("stakeEnd");
        let err = normalize(&record, 7, 18).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MalformedRecord { index: 7, .. }
        ));
    }

    #[test]
    fn non_numeric_amount_is_malformed() {
        let record = raw("not-a-number", "0", false);
        assert!(normalize(&record, 0, 18).is_err());
    }

    #[test]
    fn unlock_before_creation_is_malformed() {
        let record = json!({
            "stakedAmount": "1",
            "APR": 15.0,
            "stakeStart": 1_702_592_000,
            "stakeEnd": 1_700_000_000,
            "rewards": "0",
            "claimed": false,
        });
        assert!(normalize(&record, 0, 18).is_err());
    }

    #[test]
    fn one_malformed_record_does_not_hide_the_rest() {
        let records = vec![
            raw("1000000000000000000", "0", false),
            raw("2000000000000000000", "0", false),
            raw("oops", "0", false),
            raw("3000000000000000000", "0", true),
            raw("0", "0", true),
        ];
        let (positions, errors) = normalize_all(&records, 18);
        assert_eq!(positions.len(), 4);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            NormalizeError::MalformedRecord { index: 2, .. }
        ));
        // Surviving positions keep their on-chain ids.
        let ids: Vec<u64> = positions.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
    }
}
