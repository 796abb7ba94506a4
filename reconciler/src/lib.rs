pub mod client;
pub mod coordinator;
pub mod snapshot;

pub use client::{ActionError, EarlyUnstakeWarning, StakingClient, UnstakeOutcome};
pub use coordinator::{spawn, CycleState, ReconcilerConfig, ReconcilerHandle};
pub use snapshot::LedgerSnapshot;
