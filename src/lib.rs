//! Jornada - Progress & Rewards Engine
//!
//! The gamification core of a church community platform: converts reading
//! and quiz events into experience points, levels, reading streaks,
//! challenge progress and badge grants, rewarding each event exactly once
//! even under concurrent or retried invocation.

pub mod challenges;
pub mod engine;
pub mod identity;
pub mod levels;
pub mod logging;
pub mod progress;
pub mod quiz;
pub mod storage;
pub mod streaks;

// Re-export commonly used types
pub use challenges::{ChallengeDefinition, ChallengeKind, ChallengeStore, ChallengeTracker};
pub use engine::{EngineError, ProgressEngine, QuizReceipt, ReadingMeta, ReadingReceipt};
pub use identity::{IdentityResolver, TokenResolver};
pub use levels::LevelTable;
pub use progress::{ActorProfile, ProgressLedger, RewardDispatcher};
pub use storage::{AppConfig, Database, DatabaseError, RewardConfig};
pub use streaks::{StreakState, StreakStore};
