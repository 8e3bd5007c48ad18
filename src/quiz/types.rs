//! Quiz types and the pure grading function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Read-only quiz question reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Catalog question id
    pub id: String,
    /// Grouping key of the quiz instance this question belongs to
    pub reference_id: String,
    /// Question text
    pub prompt: String,
    /// Expected answer
    pub correct_answer: String,
}

/// One submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub question_id: String,
    pub answer: String,
}

/// Grading result before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeSheet {
    pub correct_count: u32,
    pub total_answered: u32,
    pub xp_awarded: u32,
    pub percent: f64,
}

/// Audit row for one grading call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub reference_id: String,
    pub total_answered: u32,
    pub correct_count: u32,
    pub xp_awarded: u32,
    pub percent: f64,
    pub graded_at: DateTime<Utc>,
}

/// Grade submitted answers against the question set of one reference.
/// Answers naming an unknown question are skipped, not fatal; comparison is
/// case-insensitive over trimmed text.
pub fn grade(questions: &[QuizQuestion], answers: &[QuizAnswer], xp_per_correct: u32) -> GradeSheet {
    let by_id: HashMap<&str, &QuizQuestion> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut correct_count = 0u32;
    for answer in answers {
        let Some(question) = by_id.get(answer.question_id.as_str()) else {
            continue;
        };
        if answer.answer.trim().eq_ignore_ascii_case(question.correct_answer.trim()) {
            correct_count += 1;
        }
    }

    let total_answered = answers.len() as u32;
    let percent = if total_answered == 0 {
        0.0
    } else {
        f64::from(correct_count) / f64::from(total_answered) * 100.0
    };

    GradeSheet {
        correct_count,
        total_answered,
        xp_awarded: correct_count * xp_per_correct,
        percent,
    }
}
