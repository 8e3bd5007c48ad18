//! Challenge definitions, enrollments and progress tracking.

pub mod store;
pub mod tracker;
pub mod types;

pub use store::ChallengeStore;
pub use tracker::{ChallengeTracker, CompletionSummary};
pub use types::{
    ActivityEvent, ChallengeDefinition, ChallengeEnrollment, ChallengeKind, ChallengeProgress,
    EnrollmentStatus, Evaluation,
};
