use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use stakeview_chain::Address;

use crate::policy::{PolicyBook, PolicyTable};

/// Engine configuration, passed in explicitly at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Address of the staking contract.
    pub contract_address: Address,
    /// Base-unit scale shared by all amount fields (18 for wei).
    pub token_decimals: u32,
    /// Reconciliation poll interval.
    pub poll_interval_secs: u64,
    /// Normal and test-mode duration tables.
    pub policies: PolicyBook,
}

/// Errors raised while loading or validating an engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token_decimals must be between 1 and 38, got {0}")]
    InvalidDecimals(u32),

    #[error("poll_interval_secs must be greater than zero")]
    ZeroPollInterval,

    #[error("the {0} policy table is empty")]
    EmptyTable(&'static str),

    #[error("the test-mode table must contain exactly one policy, got {0}")]
    InvalidTestTable(usize),

    #[error("duplicate duration label {0:?}")]
    DuplicateLabel(String),

    #[error("policy {0:?} has a zero lock duration")]
    ZeroLock(String),

    #[error("policy {0:?} has an invalid APR")]
    InvalidApr(String),
}

impl EngineConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate all invariants of the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // u128 holds ~3.4e38, so 38 decimals is the usable ceiling.
        if self.token_decimals == 0 || self.token_decimals > 38 {
            return Err(ConfigError::InvalidDecimals(self.token_decimals));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.policies.normal.is_empty() {
            return Err(ConfigError::EmptyTable("normal"));
        }
        if self.policies.test_mode.len() != 1 {
            return Err(ConfigError::InvalidTestTable(self.policies.test_mode.len()));
        }

        for table in [&self.policies.normal, &self.policies.test_mode] {
            Self::validate_table(table)?;
        }

        Ok(())
    }

    fn validate_table(table: &PolicyTable) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for policy in table.policies() {
            if !seen.insert(policy.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(policy.label.clone()));
            }
            if policy.lock_secs == 0 {
                return Err(ConfigError::ZeroLock(policy.label.clone()));
            }
            if !policy.apr_percent.is_finite() || policy.apr_percent < 0.0 {
                return Err(ConfigError::InvalidApr(policy.label.clone()));
            }
        }
        Ok(())
    }

    /// A ready-to-use configuration for local development and tests.
    pub fn default_local() -> Self {
        Self {
            contract_address: Address::new([0x51; 20]),
            token_decimals: 18,
            poll_interval_secs: 30,
            policies: PolicyBook::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DurationPolicy;
    use std::env;

    #[test]
    fn default_local_is_valid() {
        let config = EngineConfig::default_local();
        config.validate().unwrap();
        assert_eq!(config.token_decimals, 18);
        assert_eq!(config.policies.normal.len(), 3);
    }

    #[test]
    fn zero_decimals_fails() {
        let mut config = EngineConfig::default_local();
        config.token_decimals = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecimals(0))
        ));
    }

    #[test]
    fn zero_poll_interval_fails() {
        let mut config = EngineConfig::default_local();
        config.poll_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn empty_normal_table_fails() {
        let mut config = EngineConfig::default_local();
        config.policies.normal = PolicyTable::new(vec![]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyTable("normal"))
        ));
    }

    #[test]
    fn multi_policy_test_table_fails() {
        let mut config = EngineConfig::default_local();
        config.policies.test_mode = PolicyTable::new(vec![
            DurationPolicy::new("1 Minute", 5.0, 60),
            DurationPolicy::new("2 Minutes", 5.0, 120),
        ]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTestTable(2))
        ));
    }

    #[test]
    fn duplicate_label_fails() {
        let mut config = EngineConfig::default_local();
        config.policies.normal = PolicyTable::new(vec![
            DurationPolicy::new("30 Days", 15.0, 30 * 86_400),
            DurationPolicy::new("30 Days", 24.0, 180 * 86_400),
        ]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateLabel(_))
        ));
    }

    #[test]
    fn zero_lock_fails() {
        let mut config = EngineConfig::default_local();
        config.policies.normal =
            PolicyTable::new(vec![DurationPolicy::new("Instant", 15.0, 0)]);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroLock(_))));
    }

    #[test]
    fn file_roundtrip() {
        let config = EngineConfig::default_local();
        let dir = env::temp_dir().join(format!("stakeview_config_test_{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("engine.json");

        config.to_file(&path).unwrap();
        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config, loaded);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
