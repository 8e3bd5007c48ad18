//! Durable per-actor progress ledger.
//!
//! Low-level row operations only. All reward mutations go through
//! [`crate::progress::RewardDispatcher`], which composes these primitives
//! inside one transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::levels::LevelTable;
use crate::progress::types::{ActorProfile, BadgeGrant};
use crate::storage::database::DatabaseError;

/// Store for actor profiles, completed units, badges and the reward journal.
pub struct ProgressLedger<'a> {
    conn: &'a Connection,
}

impl<'a> ProgressLedger<'a> {
    /// Create a new ledger with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ========== Profile Operations ==========

    /// Get an actor's profile.
    pub fn get_profile(&self, actor_id: &Uuid) -> Result<Option<ActorProfile>, DatabaseError> {
        let raw = self
            .conn
            .query_row(
                "SELECT actor_id, xp_total, level_name, next_level_xp,
                        last_activity_at, created_at, updated_at
                 FROM actor_profiles WHERE actor_id = ?1",
                params![actor_id.to_string()],
                parse_profile_raw,
            )
            .optional()
            .map_err(DatabaseError::from_sqlite)?;

        raw.map(decode_profile).transpose()
    }

    /// Create the profile if it does not exist yet (lazy creation on first
    /// event). Returns true when a row was inserted.
    pub fn ensure_profile(
        &self,
        actor_id: &Uuid,
        levels: &LevelTable,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let floor = levels.resolve(0);
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO actor_profiles
                 (actor_id, xp_total, level_name, next_level_xp, created_at, updated_at)
                 VALUES (?1, 0, ?2, ?3, ?4, ?4)",
                params![
                    actor_id.to_string(),
                    floor.name,
                    levels.next_level_xp(0),
                    now,
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(inserted > 0)
    }

    /// Increment `xp_total` in place. The update happens inside the storage
    /// engine, so concurrent increments never lose each other.
    pub fn add_xp(&self, actor_id: &Uuid, xp_delta: u32) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE actor_profiles SET xp_total = xp_total + ?2, updated_at = ?3
                 WHERE actor_id = ?1",
                params![
                    actor_id.to_string(),
                    xp_delta,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Read the current XP total.
    pub fn xp_total(&self, actor_id: &Uuid) -> Result<u32, DatabaseError> {
        self.conn
            .query_row(
                "SELECT xp_total FROM actor_profiles WHERE actor_id = ?1",
                params![actor_id.to_string()],
                |row| row.get(0),
            )
            .map_err(DatabaseError::from_sqlite)
    }

    /// Store the recomputed level fields and touch the activity timestamp.
    pub fn set_level(
        &self,
        actor_id: &Uuid,
        level_name: &str,
        next_level_xp: Option<u32>,
        activity_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE actor_profiles
                 SET level_name = ?2, next_level_xp = ?3, last_activity_at = ?4, updated_at = ?4
                 WHERE actor_id = ?1",
                params![
                    actor_id.to_string(),
                    level_name,
                    next_level_xp,
                    activity_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    // ========== Completed Reading Units ==========

    /// Whether the unit was already rewarded for this actor.
    pub fn has_completed_unit(
        &self,
        actor_id: &Uuid,
        unit_id: &str,
    ) -> Result<bool, DatabaseError> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM completed_readings
                 WHERE actor_id = ?1 AND unit_id = ?2)",
                params![actor_id.to_string(), unit_id],
                |row| row.get(0),
            )
            .map_err(DatabaseError::from_sqlite)
    }

    /// Add a unit to the actor's completed set. Returns false when it was
    /// already a member.
    pub fn insert_completed_unit(
        &self,
        actor_id: &Uuid,
        unit_id: &str,
        book_id: &str,
        chapter: u32,
    ) -> Result<bool, DatabaseError> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO completed_readings
                 (actor_id, unit_id, book_id, chapter, read_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    actor_id.to_string(),
                    unit_id,
                    book_id,
                    chapter,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(inserted > 0)
    }

    /// All unit ids the actor has completed.
    pub fn completed_units(&self, actor_id: &Uuid) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT unit_id FROM completed_readings WHERE actor_id = ?1
                 ORDER BY book_id, chapter",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map(params![actor_id.to_string()], |row| row.get(0))
            .map_err(DatabaseError::from_sqlite)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::from_sqlite)
    }

    // ========== Reward Event Journal ==========

    /// Journal a reward event. Returns false when the key already exists,
    /// which makes every reward application replay-safe: the first writer
    /// wins, everyone else observes a no-op.
    pub fn journal_event(
        &self,
        event_key: &str,
        actor_id: &Uuid,
        xp_delta: u32,
    ) -> Result<bool, DatabaseError> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO reward_events (event_key, actor_id, xp_delta, applied_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    event_key,
                    actor_id.to_string(),
                    xp_delta,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(inserted > 0)
    }

    // ========== Badge Grants ==========

    /// Grant a badge once. A duplicate grant is a no-op, reported as false.
    pub fn grant_badge(&self, actor_id: &Uuid, badge_id: &str) -> Result<bool, DatabaseError> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO badge_grants (actor_id, badge_id, granted_at)
                 VALUES (?1, ?2, ?3)",
                params![actor_id.to_string(), badge_id, Utc::now().to_rfc3339()],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(inserted > 0)
    }

    /// Badges held by an actor.
    pub fn badges_for(&self, actor_id: &Uuid) -> Result<Vec<BadgeGrant>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT badge_id, granted_at FROM badge_grants
                 WHERE actor_id = ?1 ORDER BY granted_at ASC",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map(params![actor_id.to_string()], |row| {
                let badge_id: String = row.get(0)?;
                let granted_str: String = row.get(1)?;
                Ok((badge_id, granted_str))
            })
            .map_err(DatabaseError::from_sqlite)?;

        let mut grants = Vec::new();
        for row in rows {
            let (badge_id, granted_str) = row.map_err(DatabaseError::from_sqlite)?;
            grants.push(BadgeGrant {
                actor_id: *actor_id,
                badge_id,
                granted_at: parse_utc(&granted_str)?,
            });
        }
        Ok(grants)
    }
}

struct RawProfile {
    actor_id: String,
    xp_total: u32,
    level_name: String,
    next_level_xp: Option<u32>,
    last_activity_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn parse_profile_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
    Ok(RawProfile {
        actor_id: row.get(0)?,
        xp_total: row.get(1)?,
        level_name: row.get(2)?,
        next_level_xp: row.get(3)?,
        last_activity_at: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn decode_profile(raw: RawProfile) -> Result<ActorProfile, DatabaseError> {
    Ok(ActorProfile {
        actor_id: Uuid::parse_str(&raw.actor_id)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
        xp_total: raw.xp_total,
        level_name: raw.level_name,
        next_level_xp: raw.next_level_xp,
        last_activity_at: raw.last_activity_at.as_deref().map(parse_utc).transpose()?,
        created_at: parse_utc(&raw.created_at)?,
        updated_at: parse_utc(&raw.updated_at)?,
    })
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
}

/// Parse a `"<book>.<chapter>"` unit id into its day-free components.
/// Shared by ingress validation and challenge matching.
pub fn split_unit_id(unit_id: &str) -> Option<(String, u32)> {
    let (book, chapter) = unit_id.rsplit_once('.')?;
    let book = book.trim();
    if book.is_empty() {
        return None;
    }
    let chapter: u32 = chapter.trim().parse().ok()?;
    if chapter == 0 {
        return None;
    }
    Some((book.to_uppercase(), chapter))
}
