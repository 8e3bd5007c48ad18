//! Challenge definition and enrollment persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::challenges::types::{
    ChallengeDefinition, ChallengeEnrollment, ChallengeKind, ChallengeProgress, EnrollmentStatus,
};
use crate::storage::database::DatabaseError;

/// Challenge management errors.
#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Unknown challenge: {0}")]
    UnknownChallenge(Uuid),

    #[error("Actor {actor_id} is already enrolled in challenge {challenge_id}")]
    AlreadyEnrolled { actor_id: Uuid, challenge_id: Uuid },

    #[error("Enrollment {0} contended past the retry budget")]
    Contended(Uuid),
}

/// Store for challenge definitions and enrollments.
pub struct ChallengeStore<'a> {
    conn: &'a Connection,
}

impl<'a> ChallengeStore<'a> {
    /// Create a new challenge store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ========== Definition Operations ==========

    /// Publish a challenge definition. Definitions are immutable afterwards.
    pub fn publish(&self, definition: &ChallengeDefinition) -> Result<(), ChallengeError> {
        let kind_json = serde_json::to_string(&definition.kind)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO challenge_definitions (id, title, kind_json, bonus_xp, badge_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    definition.id.to_string(),
                    definition.title,
                    kind_json,
                    definition.bonus_xp,
                    definition.badge_id,
                    definition.created_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Get a definition by id.
    pub fn get_definition(
        &self,
        id: &Uuid,
    ) -> Result<Option<ChallengeDefinition>, ChallengeError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, kind_json, bonus_xp, badge_id, created_at
                 FROM challenge_definitions WHERE id = ?1",
                params![id.to_string()],
                parse_definition_raw,
            )
            .optional()
            .map_err(DatabaseError::from_sqlite)?;

        row.map(decode_definition).transpose()
    }

    /// All published definitions, newest first.
    pub fn list_definitions(&self) -> Result<Vec<ChallengeDefinition>, ChallengeError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, kind_json, bonus_xp, badge_id, created_at
                 FROM challenge_definitions ORDER BY created_at DESC",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map([], parse_definition_raw)
            .map_err(DatabaseError::from_sqlite)?;

        let mut definitions = Vec::new();
        for row in rows {
            let raw = row.map_err(DatabaseError::from_sqlite)?;
            definitions.push(decode_definition(raw)?);
        }
        Ok(definitions)
    }

    // ========== Enrollment Operations ==========

    /// Enroll an actor into a challenge with fresh progress.
    pub fn enroll(
        &self,
        actor_id: &Uuid,
        challenge_id: &Uuid,
    ) -> Result<ChallengeEnrollment, ChallengeError> {
        let definition = self
            .get_definition(challenge_id)?
            .ok_or(ChallengeError::UnknownChallenge(*challenge_id))?;

        let enrollment = ChallengeEnrollment {
            id: Uuid::new_v4(),
            actor_id: *actor_id,
            challenge_id: *challenge_id,
            status: EnrollmentStatus::Active,
            progress: ChallengeProgress::initial_for(&definition.kind),
            version: 0,
            enrolled_at: Utc::now(),
            completed_at: None,
        };

        let progress_json = serde_json::to_string(&enrollment.progress)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO challenge_enrollments
                 (id, actor_id, challenge_id, status, progress_json, version, enrolled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    enrollment.id.to_string(),
                    actor_id.to_string(),
                    challenge_id.to_string(),
                    enrollment.status.as_str(),
                    progress_json,
                    enrollment.enrolled_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;

        if inserted == 0 {
            return Err(ChallengeError::AlreadyEnrolled {
                actor_id: *actor_id,
                challenge_id: *challenge_id,
            });
        }

        Ok(enrollment)
    }

    /// All enrollments of an actor.
    pub fn enrollments_for(
        &self,
        actor_id: &Uuid,
    ) -> Result<Vec<ChallengeEnrollment>, ChallengeError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, actor_id, challenge_id, status, progress_json, version,
                        enrolled_at, completed_at
                 FROM challenge_enrollments WHERE actor_id = ?1
                 ORDER BY enrolled_at ASC",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map(params![actor_id.to_string()], parse_enrollment_raw)
            .map_err(DatabaseError::from_sqlite)?;

        let mut enrollments = Vec::new();
        for row in rows {
            let raw = row.map_err(DatabaseError::from_sqlite)?;
            enrollments.push(decode_enrollment(raw)?);
        }
        Ok(enrollments)
    }

    /// Reload one enrollment.
    pub fn get_enrollment(
        &self,
        enrollment_id: &Uuid,
    ) -> Result<Option<ChallengeEnrollment>, ChallengeError> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, actor_id, challenge_id, status, progress_json, version,
                        enrolled_at, completed_at
                 FROM challenge_enrollments WHERE id = ?1",
                params![enrollment_id.to_string()],
                parse_enrollment_raw,
            )
            .optional()
            .map_err(DatabaseError::from_sqlite)?;

        raw.map(decode_enrollment).transpose()
    }

    /// Active enrollments of an actor joined with their definitions.
    /// Enrollments whose definition has disappeared are dropped by the join;
    /// rows with undecodable payloads are skipped with a warning.
    pub fn active_with_definitions(
        &self,
        actor_id: &Uuid,
    ) -> Result<Vec<(ChallengeEnrollment, ChallengeDefinition)>, ChallengeError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT e.id, e.actor_id, e.challenge_id, e.status, e.progress_json, e.version,
                        e.enrolled_at, e.completed_at,
                        d.id, d.title, d.kind_json, d.bonus_xp, d.badge_id, d.created_at
                 FROM challenge_enrollments e
                 JOIN challenge_definitions d ON d.id = e.challenge_id
                 WHERE e.actor_id = ?1 AND e.status = 'Active'
                 ORDER BY e.enrolled_at ASC",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map(params![actor_id.to_string()], |row| {
                let enrollment = parse_enrollment_raw(row)?;
                let definition = RawDefinition {
                    id: row.get(8)?,
                    title: row.get(9)?,
                    kind_json: row.get(10)?,
                    bonus_xp: row.get(11)?,
                    badge_id: row.get(12)?,
                    created_at: row.get(13)?,
                };
                Ok((enrollment, definition))
            })
            .map_err(DatabaseError::from_sqlite)?;

        let mut result = Vec::new();
        for row in rows {
            let (raw_enrollment, raw_definition) = row.map_err(DatabaseError::from_sqlite)?;
            let enrollment_id = raw_enrollment.id.clone();
            match (decode_enrollment(raw_enrollment), decode_definition(raw_definition)) {
                (Ok(enrollment), Ok(definition)) => result.push((enrollment, definition)),
                (enrollment, definition) => {
                    let error = enrollment
                        .err()
                        .or(definition.err())
                        .map(|e| e.to_string())
                        .unwrap_or_default();
                    tracing::warn!(%enrollment_id, %error, "skipping undecodable enrollment");
                }
            }
        }
        Ok(result)
    }

    /// Persist advanced progress, guarded by the version stamp. Returns
    /// false on a concurrent update (caller reloads and retries).
    pub fn persist_progress(
        &self,
        enrollment_id: &Uuid,
        progress: &ChallengeProgress,
        expected_version: i64,
    ) -> Result<bool, ChallengeError> {
        let progress_json = serde_json::to_string(progress)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        let updated = self
            .conn
            .execute(
                "UPDATE challenge_enrollments
                 SET progress_json = ?2, version = version + 1
                 WHERE id = ?1 AND version = ?3 AND status = 'Active'",
                params![enrollment_id.to_string(), progress_json, expected_version],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(updated > 0)
    }

    /// Transition an enrollment to Completed, guarded by the version stamp.
    /// The transition is one-way; a row already Completed never matches.
    pub fn complete(
        &self,
        enrollment_id: &Uuid,
        progress: &ChallengeProgress,
        expected_version: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, ChallengeError> {
        let progress_json = serde_json::to_string(progress)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        let updated = self
            .conn
            .execute(
                "UPDATE challenge_enrollments
                 SET status = 'Completed', progress_json = ?2, version = version + 1,
                     completed_at = ?4
                 WHERE id = ?1 AND version = ?3 AND status = 'Active'",
                params![
                    enrollment_id.to_string(),
                    progress_json,
                    expected_version,
                    completed_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(updated > 0)
    }
}

struct RawDefinition {
    id: String,
    title: String,
    kind_json: String,
    bonus_xp: u32,
    badge_id: Option<String>,
    created_at: String,
}

struct RawEnrollment {
    id: String,
    actor_id: String,
    challenge_id: String,
    status: String,
    progress_json: String,
    version: i64,
    enrolled_at: String,
    completed_at: Option<String>,
}

fn parse_definition_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDefinition> {
    Ok(RawDefinition {
        id: row.get(0)?,
        title: row.get(1)?,
        kind_json: row.get(2)?,
        bonus_xp: row.get(3)?,
        badge_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn parse_enrollment_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEnrollment> {
    Ok(RawEnrollment {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        challenge_id: row.get(2)?,
        status: row.get(3)?,
        progress_json: row.get(4)?,
        version: row.get(5)?,
        enrolled_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

fn decode_definition(raw: RawDefinition) -> Result<ChallengeDefinition, ChallengeError> {
    let kind: ChallengeKind = serde_json::from_str(&raw.kind_json)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    Ok(ChallengeDefinition {
        id: parse_uuid(&raw.id)?,
        title: raw.title,
        kind,
        bonus_xp: raw.bonus_xp,
        badge_id: raw.badge_id,
        created_at: parse_utc(&raw.created_at)?,
    })
}

fn decode_enrollment(raw: RawEnrollment) -> Result<ChallengeEnrollment, ChallengeError> {
    let progress: ChallengeProgress = serde_json::from_str(&raw.progress_json)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    let status = match raw.status.as_str() {
        "Completed" => EnrollmentStatus::Completed,
        _ => EnrollmentStatus::Active,
    };

    Ok(ChallengeEnrollment {
        id: parse_uuid(&raw.id)?,
        actor_id: parse_uuid(&raw.actor_id)?,
        challenge_id: parse_uuid(&raw.challenge_id)?,
        status,
        progress,
        version: raw.version,
        enrolled_at: parse_utc(&raw.enrolled_at)?,
        completed_at: raw.completed_at.as_deref().map(parse_utc).transpose()?,
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid, ChallengeError> {
    Uuid::parse_str(raw)
        .map_err(|e| ChallengeError::Database(DatabaseError::QueryFailed(e.to_string())))
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, ChallengeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ChallengeError::Database(DatabaseError::QueryFailed(e.to_string())))
}
