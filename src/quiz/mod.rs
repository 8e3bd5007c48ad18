//! Quiz reference data, grading and audit rows.

pub mod store;
pub mod types;

pub use store::QuizStore;
pub use types::{grade, GradeSheet, QuizAnswer, QuizQuestion, QuizResult};
