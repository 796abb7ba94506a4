use async_trait::async_trait;

use crate::types::{Address, ChainError, RawStakeRecord, TxReceipt};

/// Read and mutation boundary to the staking contract.
///
/// The wallet layer behind this trait owns connection, signing, and
/// broadcasting. Submission methods resolve once the transaction is
/// confirmed or has definitively failed; a resolved `Ok` is the
/// confirmation, not merely the submission.
#[async_trait]
pub trait StakingChain: Send + Sync + 'static {
    /// The user's full stake list. May legitimately be empty.
    async fn get_stakes(&self, account: Address) -> Result<Vec<RawStakeRecord>, ChainError>;

    /// The authoritative contract-wide test-mode flag.
    async fn get_test_mode(&self) -> Result<bool, ChainError>;

    /// Stake `base_units` tokens under the named duration.
    async fn submit_stake(
        &self,
        account: Address,
        duration_label: &str,
        base_units: u128,
    ) -> Result<TxReceipt, ChainError>;

    /// Withdraw the remaining principal of a stake.
    async fn submit_unstake(&self, account: Address, stake_id: u64)
        -> Result<TxReceipt, ChainError>;

    /// Claim the accrued rewards of a stake.
    async fn submit_claim(&self, account: Address, stake_id: u64)
        -> Result<TxReceipt, ChainError>;
}
