//! Reading streak tracking.

pub mod calc;
pub mod store;

pub use calc::StreakState;
pub use store::StreakStore;
