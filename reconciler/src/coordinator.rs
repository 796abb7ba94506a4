use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use stakeview_chain::{Address, ChainError, StakingChain};
use stakeview_engine::normalize;

use crate::snapshot::LedgerSnapshot;

/// Where the reconciler is within the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Applying,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Fixed polling interval between reconciliation cycles.
    pub poll_interval: Duration,
    /// Base-unit scale shared by all amount fields.
    pub token_decimals: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            token_decimals: 18,
        }
    }
}

#[derive(Debug)]
enum Command {
    Refresh,
    AccountChanged(Address),
    Shutdown,
}

/// State shared between the runner and its handles.
struct Shared {
    snapshot: RwLock<LedgerSnapshot>,
    last_error: RwLock<Option<ChainError>>,
    state: RwLock<CycleState>,
}

/// Cloneable handle for reading the published snapshot and driving the
/// runner. All triggers funnel through one command channel into the
/// single runner task, so overlapping triggers can never start
/// concurrent fetches.
#[derive(Clone)]
pub struct ReconcilerHandle {
    cmd_tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl ReconcilerHandle {
    /// The latest applied snapshot.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.shared.snapshot.read().clone()
    }

    /// The failure of the most recent cycle, if it failed. Cleared by
    /// the next successful cycle.
    pub fn last_error(&self) -> Option<ChainError> {
        self.shared.last_error.read().clone()
    }

    /// Where the runner currently is in its cycle (for a UI "refreshing"
    /// indicator; the snapshot itself is always consistent).
    pub fn cycle_state(&self) -> CycleState {
        *self.shared.state.read()
    }

    /// Request an out-of-cycle reconciliation.
    pub async fn refresh_now(&self) {
        let _ = self.cmd_tx.send(Command::Refresh).await;
    }

    /// Tell the runner the wallet switched accounts.
    pub async fn account_changed(&self, account: Address) {
        let _ = self.cmd_tx.send(Command::AccountChanged(account)).await;
    }

    /// Stop the runner. Any in-flight fetch result is discarded.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }
}

/// Spawn the reconciliation runner for `account` and return its handle.
/// The first cycle runs immediately.
pub fn spawn<C: StakingChain>(
    chain: Arc<C>,
    account: Address,
    config: ReconcilerConfig,
) -> ReconcilerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let shared = Arc::new(Shared {
        snapshot: RwLock::new(LedgerSnapshot::default()),
        last_error: RwLock::new(None),
        state: RwLock::new(CycleState::Idle),
    });

    let runner = Reconciler {
        chain,
        account,
        config,
        cmd_rx,
        shared: shared.clone(),
    };
    tokio::spawn(runner.run());

    ReconcilerHandle { cmd_tx, shared }
}

/// Outcome of one reconciliation pass.
enum CycleEnd {
    Continue,
    Shutdown,
}

/// Owns the published snapshot and runs the per-cycle state machine
/// `Idle -> Fetching -> {Applying | Failed} -> Idle`.
struct Reconciler<C> {
    chain: Arc<C>,
    account: Address,
    config: ReconcilerConfig,
    cmd_rx: mpsc::Receiver<Command>,
    shared: Arc<Shared>,
}

impl<C: StakingChain> Reconciler<C> {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(account = %self.account, "reconciler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if matches!(self.reconcile().await, CycleEnd::Shutdown) {
                        break;
                    }
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Refresh) => {
                        if matches!(self.reconcile().await, CycleEnd::Shutdown) {
                            break;
                        }
                    }
                    Some(Command::AccountChanged(account)) => {
                        info!(%account, "account changed");
                        self.account = account;
                        if matches!(self.reconcile().await, CycleEnd::Shutdown) {
                            break;
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
        }

        self.set_state(CycleState::Idle);
        info!("reconciler stopped");
    }

    fn set_state(&self, state: CycleState) {
        *self.shared.state.write() = state;
    }

    /// One fetch-normalize-publish pass.
    ///
    /// Commands arriving while the fetch is in flight are absorbed here
    /// instead of starting a second fetch: any number of refresh
    /// requests coalesce into one trailing pass after the current fetch
    /// applies, an account change discards the stale result and
    /// refetches, and a shutdown discards it outright.
    async fn reconcile(&mut self) -> CycleEnd {
        loop {
            let account = self.account;
            self.set_state(CycleState::Fetching);
            debug!(%account, "fetching stakes");

            let chain = Arc::clone(&self.chain);
            let fetch = async move { chain.get_stakes(account).await };
            tokio::pin!(fetch);

            let mut pending_refresh = false;
            let fetched = loop {
                tokio::select! {
                    result = &mut fetch => break result,
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(Command::Refresh) => pending_refresh = true,
                        Some(Command::AccountChanged(new_account)) => {
                            info!(account = %new_account, "account changed mid-fetch");
                            self.account = new_account;
                        }
                        Some(Command::Shutdown) | None => {
                            debug!("shutdown during fetch, discarding result");
                            return CycleEnd::Shutdown;
                        }
                    }
                }
            };

            if self.account != account {
                // The result belongs to the replaced account.
                debug!(stale = %account, "discarding fetch for replaced account");
                continue;
            }

            match fetched {
                Ok(raw) => {
                    self.set_state(CycleState::Applying);
                    let (positions, errors) =
                        normalize::normalize_all(&raw, self.config.token_decimals);
                    let snapshot = LedgerSnapshot::partition(positions);
                    debug!(
                        active = snapshot.active.len(),
                        historical = snapshot.historical.len(),
                        skipped = errors.len(),
                        "applying snapshot"
                    );
                    *self.shared.snapshot.write() = snapshot;
                    *self.shared.last_error.write() = None;
                }
                Err(error) => {
                    // Previous snapshot stands; the next cycle retries.
                    self.set_state(CycleState::Failed);
                    warn!(%account, %error, "stake fetch failed, keeping previous snapshot");
                    *self.shared.last_error.write() = Some(error);
                }
            }

            self.set_state(CycleState::Idle);
            if pending_refresh {
                // Refreshes absorbed mid-fetch still owe one pass over
                // the post-fetch chain state.
                debug!("running coalesced refresh");
                continue;
            }
            return CycleEnd::Continue;
        }
    }
}
