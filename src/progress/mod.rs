//! Progress ledger and reward dispatch.

pub mod dispatcher;
pub mod ledger;
pub mod types;

pub use dispatcher::RewardDispatcher;
pub use ledger::ProgressLedger;
pub use types::{ActorProfile, BadgeGrant, RewardOutcome};
