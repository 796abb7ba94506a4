use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use stakeview_chain::{Address, ChainError, StakingChain, TxReceipt};
use stakeview_engine::{
    eligibility::{self, EARLY_UNSTAKE_PENALTY_PERCENT},
    normalize, projection, ActionEligibility, DurationPolicy, EngineConfig, PolicyError,
    ProjectedStake, StakePosition,
};

use crate::coordinator::{self, ReconcilerConfig, ReconcilerHandle};
use crate::snapshot::LedgerSnapshot;

/// What the user must acknowledge before an early unstake proceeds.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyUnstakeWarning {
    /// Fixed penalty rate deducted from the withdrawn principal.
    pub penalty_percent: f64,
    /// When the stake would have unlocked penalty-free.
    pub unlock_at: DateTime<Utc>,
}

/// Result of an unstake request.
#[derive(Debug, Clone, PartialEq)]
pub enum UnstakeOutcome {
    Submitted(TxReceipt),
    /// The user declined the early-unstake confirmation; nothing was sent.
    Declined,
}

/// Failures at the submission boundary. Mutation failures are surfaced,
/// never silently retried.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("no stake with id {0}")]
    UnknownStake(u64),
}

/// The UI-facing surface of the engine: synchronous reads of the
/// published snapshot, pure projection/eligibility helpers, and the
/// mutation drivers that submit transactions and force a
/// reconciliation once they confirm.
pub struct StakingClient<C: StakingChain> {
    chain: Arc<C>,
    config: EngineConfig,
    account: Address,
    test_mode: bool,
    reconciler: ReconcilerHandle,
}

impl<C: StakingChain> StakingClient<C> {
    /// Read the authoritative test-mode flag, spawn the reconciler for
    /// `account`, and return the connected client.
    pub async fn connect(
        chain: Arc<C>,
        config: EngineConfig,
        account: Address,
    ) -> Result<Self, ChainError> {
        let test_mode = chain.get_test_mode().await?;
        let reconciler = coordinator::spawn(
            chain.clone(),
            account,
            ReconcilerConfig {
                poll_interval: Duration::from_secs(config.poll_interval_secs),
                token_decimals: config.token_decimals,
            },
        );
        info!(%account, test_mode, "staking client connected");
        Ok(Self {
            chain,
            config,
            account,
            test_mode,
            reconciler,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// The underlying reconciler handle (account-change wiring, teardown).
    pub fn reconciler(&self) -> &ReconcilerHandle {
        &self.reconciler
    }

    /// The latest applied snapshot.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.reconciler.snapshot()
    }

    /// The most recent cycle failure, if any (transient indicator).
    pub fn last_fetch_error(&self) -> Option<ChainError> {
        self.reconciler.last_error()
    }

    /// Recompute the projection for the current form inputs. Safe to
    /// call on every keystroke.
    pub fn project(
        &self,
        amount_input: &str,
        duration_label: &str,
    ) -> Result<ProjectedStake, PolicyError> {
        let policy = self
            .config
            .policies
            .resolve(duration_label, self.test_mode)?;
        Ok(projection::project(
            amount_input,
            policy,
            self.test_mode,
            Utc::now(),
        ))
    }

    /// Current action eligibility for a position, at this instant.
    pub fn eligibility(&self, position: &StakePosition) -> ActionEligibility {
        eligibility::eligibility(position, Utc::now())
    }

    /// Trigger an out-of-cycle reconciliation.
    pub async fn refresh_now(&self) {
        self.reconciler.refresh_now().await;
    }

    /// Re-read the authoritative test-mode flag. Returns true if it
    /// changed; the caller must then re-validate any held duration
    /// selection (see [`Self::revalidate_selection`]).
    pub async fn refresh_test_mode(&mut self) -> Result<bool, ChainError> {
        let test_mode = self.chain.get_test_mode().await?;
        let changed = test_mode != self.test_mode;
        if changed {
            info!(test_mode, "test mode switched, duration selections must be re-validated");
            self.test_mode = test_mode;
        }
        Ok(changed)
    }

    /// Re-resolve a held duration selection against the active table.
    /// `None` means the selection is no longer valid and must be cleared.
    pub fn revalidate_selection(&self, duration_label: &str) -> Option<&DurationPolicy> {
        self.config
            .policies
            .revalidate_selection(duration_label, self.test_mode)
    }

    /// Submit a new stake. This is the submission boundary: the amount
    /// must be a positive finite decimal and the label must resolve in
    /// the active table, otherwise nothing is sent.
    pub async fn stake(
        &self,
        duration_label: &str,
        amount_input: &str,
    ) -> Result<TxReceipt, ActionError> {
        let amount = projection::parse_amount(amount_input)
            .filter(|a| *a > 0.0)
            .ok_or_else(|| {
                ActionError::InvalidInput(format!("not a positive amount: {amount_input:?}"))
            })?;
        self.config
            .policies
            .resolve(duration_label, self.test_mode)?;

        let base_units = normalize::parse_base_units(amount_input, self.config.token_decimals)
            .ok_or_else(|| {
                ActionError::InvalidInput(format!(
                    "amount exceeds the {}-decimal token scale: {amount_input:?}",
                    self.config.token_decimals
                ))
            })?;
        let receipt = self
            .chain
            .submit_stake(self.account, duration_label, base_units)
            .await?;
        info!(tx_hash = %receipt.tx_hash, amount, duration = duration_label, "stake confirmed");
        self.reconciler.refresh_now().await;
        Ok(receipt)
    }

    /// Withdraw the remaining principal of a stake. If the stake is
    /// still locked, `confirm_early` is consulted with the penalty
    /// details first; declining is a no-op.
    pub async fn unstake<F>(
        &self,
        stake_id: u64,
        confirm_early: F,
    ) -> Result<UnstakeOutcome, ActionError>
    where
        F: FnOnce(&EarlyUnstakeWarning) -> bool,
    {
        let position = self.find_position(stake_id)?;
        let status = eligibility::eligibility(&position, Utc::now());
        if !status.can_unstake {
            return Err(ActionError::InvalidInput(format!(
                "stake {stake_id} has no principal left"
            )));
        }

        if status.early_penalty_warning {
            let warning = EarlyUnstakeWarning {
                penalty_percent: EARLY_UNSTAKE_PENALTY_PERCENT,
                unlock_at: position.unlock_at,
            };
            if !confirm_early(&warning) {
                info!(stake_id, "early unstake declined");
                return Ok(UnstakeOutcome::Declined);
            }
        }

        let receipt = self.chain.submit_unstake(self.account, stake_id).await?;
        info!(tx_hash = %receipt.tx_hash, stake_id, "unstake confirmed");
        self.reconciler.refresh_now().await;
        Ok(UnstakeOutcome::Submitted(receipt))
    }

    /// Claim the accrued rewards of a stake.
    pub async fn claim(&self, stake_id: u64) -> Result<TxReceipt, ActionError> {
        let position = self.find_position(stake_id)?;
        let status = eligibility::eligibility(&position, Utc::now());
        if !status.can_claim {
            return Err(ActionError::InvalidInput(format!(
                "stake {stake_id} has nothing to claim"
            )));
        }

        let receipt = self.chain.submit_claim(self.account, stake_id).await?;
        info!(tx_hash = %receipt.tx_hash, stake_id, "claim confirmed");
        self.reconciler.refresh_now().await;
        Ok(receipt)
    }

    /// Stop the reconciler; in-flight fetch results are discarded.
    pub async fn shutdown(&self) {
        self.reconciler.shutdown().await;
    }

    fn find_position(&self, stake_id: u64) -> Result<StakePosition, ActionError> {
        self.snapshot()
            .position(stake_id)
            .cloned()
            .ok_or(ActionError::UnknownStake(stake_id))
    }
}
