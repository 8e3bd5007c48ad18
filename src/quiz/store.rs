//! Quiz question and result persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::quiz::types::{QuizQuestion, QuizResult};
use crate::storage::database::DatabaseError;

/// Store for quiz reference data and grading audit rows.
pub struct QuizStore<'a> {
    conn: &'a Connection,
}

impl<'a> QuizStore<'a> {
    /// Create a new quiz store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a question (content import surface).
    pub fn insert_question(&self, question: &QuizQuestion) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO quiz_questions (id, reference_id, prompt, correct_answer)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    question.id,
                    question.reference_id,
                    question.prompt,
                    question.correct_answer,
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Question set of one quiz instance.
    pub fn questions_for_reference(
        &self,
        reference_id: &str,
    ) -> Result<Vec<QuizQuestion>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, reference_id, prompt, correct_answer
                 FROM quiz_questions WHERE reference_id = ?1 ORDER BY id",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map(params![reference_id], |row| {
                Ok(QuizQuestion {
                    id: row.get(0)?,
                    reference_id: row.get(1)?,
                    prompt: row.get(2)?,
                    correct_answer: row.get(3)?,
                })
            })
            .map_err(DatabaseError::from_sqlite)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::from_sqlite)
    }

    /// Persist one grading audit row.
    pub fn insert_result(&self, result: &QuizResult) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO quiz_results
                 (id, actor_id, reference_id, total_answered, correct_count, xp_awarded, percent, graded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    result.id.to_string(),
                    result.actor_id.to_string(),
                    result.reference_id,
                    result.total_answered,
                    result.correct_count,
                    result.xp_awarded,
                    result.percent,
                    result.graded_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Grading history of an actor, newest first.
    pub fn results_for(&self, actor_id: &Uuid) -> Result<Vec<QuizResult>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, actor_id, reference_id, total_answered, correct_count,
                        xp_awarded, percent, graded_at
                 FROM quiz_results WHERE actor_id = ?1 ORDER BY graded_at DESC",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map(params![actor_id.to_string()], |row| {
                let id_str: String = row.get(0)?;
                let actor_str: String = row.get(1)?;
                let graded_str: String = row.get(7)?;
                Ok((
                    id_str,
                    actor_str,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, f64>(6)?,
                    graded_str,
                ))
            })
            .map_err(DatabaseError::from_sqlite)?;

        let mut results = Vec::new();
        for row in rows {
            let (id_str, actor_str, reference_id, total, correct, xp, percent, graded_str) =
                row.map_err(DatabaseError::from_sqlite)?;
            results.push(QuizResult {
                id: Uuid::parse_str(&id_str)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
                actor_id: Uuid::parse_str(&actor_str)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
                reference_id,
                total_answered: total,
                correct_count: correct,
                xp_awarded: xp,
                percent,
                graded_at: DateTime::parse_from_rfc3339(&graded_str)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            });
        }
        Ok(results)
    }
}
