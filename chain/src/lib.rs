pub mod client;
pub mod mock;
pub mod types;

pub use client::StakingChain;
pub use mock::{MockChain, MockPolicy};
pub use types::{Address, AddressParseError, ChainError, RawStakeRecord, TxReceipt};
