pub mod config;
pub mod eligibility;
pub mod normalize;
pub mod policy;
pub mod projection;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use eligibility::{eligibility, EARLY_UNSTAKE_PENALTY_PERCENT};
pub use policy::{DurationPolicy, PolicyBook, PolicyTable};
pub use projection::project;
pub use types::*;
