use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;

use crate::client::StakingChain;
use crate::types::{Address, ChainError, RawStakeRecord, TxReceipt};

const YEAR_SECS: u128 = 365 * 86_400;

/// Contract-side duration policy the mock uses to fabricate records.
#[derive(Debug, Clone)]
pub struct MockPolicy {
    pub label: String,
    pub apr_percent: f64,
    pub lock_secs: u64,
}

impl MockPolicy {
    pub fn new(label: impl Into<String>, apr_percent: f64, lock_secs: u64) -> Self {
        Self {
            label: label.into(),
            apr_percent,
            lock_secs,
        }
    }
}

/// In-memory stand-in for the staking contract.
///
/// Implements the full stake/unstake/claim lifecycle so tests and the
/// demo CLI can exercise the engine end-to-end, and offers scripting
/// knobs: per-fetch latency, injectable fetch failures, raw-record
/// injection, and a fetch counter for concurrency assertions.
pub struct MockChain {
    policies: Vec<MockPolicy>,
    test_mode: AtomicBool,
    stakes: Mutex<HashMap<Address, Vec<RawStakeRecord>>>,
    latency: Mutex<Duration>,
    fail_next_fetch: Mutex<Option<ChainError>>,
    fetches: AtomicUsize,
    next_tx: AtomicU64,
}

impl MockChain {
    pub fn new(policies: Vec<MockPolicy>, test_mode: bool) -> Self {
        Self {
            policies,
            test_mode: AtomicBool::new(test_mode),
            stakes: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
            fail_next_fetch: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Artificial delay applied to every `get_stakes` call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Make the next `get_stakes` call fail with `error`.
    pub fn fail_next_fetch(&self, error: ChainError) {
        *self.fail_next_fetch.lock() = Some(error);
    }

    /// Flip the contract-wide test-mode flag.
    pub fn set_test_mode(&self, test_mode: bool) {
        self.test_mode.store(test_mode, Ordering::SeqCst);
    }

    /// Append a raw record verbatim (for malformed-input tests).
    pub fn push_raw(&self, account: Address, record: RawStakeRecord) {
        self.stakes.lock().entry(account).or_default().push(record);
    }

    /// Drop all records for an account.
    pub fn clear(&self, account: Address) {
        self.stakes.lock().remove(&account);
    }

    /// Total number of `get_stakes` calls issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn record_count(&self, account: Address) -> usize {
        self.stakes.lock().get(&account).map_or(0, Vec::len)
    }

    fn next_receipt(&self) -> TxReceipt {
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        TxReceipt {
            tx_hash: format!("0x{n:064x}"),
        }
    }

    fn revert(&self) -> ChainError {
        ChainError::TransactionReverted {
            tx_hash: self.next_receipt().tx_hash,
        }
    }

    /// Rewards the way the contract would compute them at stake time:
    /// integer bps math, flat-applied in test mode.
    fn reward_base_units(&self, base_units: u128, policy: &MockPolicy) -> u128 {
        let apr_bps = (policy.apr_percent * 100.0).round() as u128;
        if self.test_mode.load(Ordering::SeqCst) {
            base_units * apr_bps / 10_000
        } else {
            base_units * apr_bps * policy.lock_secs as u128 / (10_000 * YEAR_SECS)
        }
    }
}

#[async_trait]
impl StakingChain for MockChain {
    async fn get_stakes(&self, account: Address) -> Result<Vec<RawStakeRecord>, ChainError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.fail_next_fetch.lock().take() {
            return Err(error);
        }
        Ok(self
            .stakes
            .lock()
            .get(&account)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_test_mode(&self) -> Result<bool, ChainError> {
        Ok(self.test_mode.load(Ordering::SeqCst))
    }

    async fn submit_stake(
        &self,
        account: Address,
        duration_label: &str,
        base_units: u128,
    ) -> Result<TxReceipt, ChainError> {
        if base_units == 0 {
            return Err(self.revert());
        }
        let Some(policy) = self.policies.iter().find(|p| p.label == duration_label) else {
            return Err(self.revert());
        };

        let now = Utc::now().timestamp();
        let record = json!({
            "stakedAmount": base_units.to_string(),
            "APR": policy.apr_percent,
            "stakeStart": now,
            "stakeEnd": now + policy.lock_secs as i64,
            "rewards": self.reward_base_units(base_units, policy).to_string(),
            "claimed": false,
        });
        self.stakes.lock().entry(account).or_default().push(record);
        debug!(%account, duration = duration_label, base_units, "mock stake recorded");
        Ok(self.next_receipt())
    }

    async fn submit_unstake(
        &self,
        account: Address,
        stake_id: u64,
    ) -> Result<TxReceipt, ChainError> {
        let mut stakes = self.stakes.lock();
        let record = stakes
            .get_mut(&account)
            .and_then(|records| records.get_mut(stake_id as usize))
            .ok_or_else(|| self.revert())?;

        if record.get("stakedAmount").and_then(|v| v.as_str()) == Some("0") {
            return Err(self.revert());
        }
        record["stakedAmount"] = json!("0");
        debug!(%account, stake_id, "mock unstake recorded");
        Ok(self.next_receipt())
    }

    async fn submit_claim(&self, account: Address, stake_id: u64) -> Result<TxReceipt, ChainError> {
        let mut stakes = self.stakes.lock();
        let record = stakes
            .get_mut(&account)
            .and_then(|records| records.get_mut(stake_id as usize))
            .ok_or_else(|| self.revert())?;

        if record.get("claimed").and_then(|v| v.as_bool()) == Some(true) {
            return Err(self.revert());
        }
        record["claimed"] = json!(true);
        debug!(%account, stake_id, "mock claim recorded");
        Ok(self.next_receipt())
    }
}
