//! Streak state persistence and rolling daily activity markers.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::storage::database::DatabaseError;
use crate::streaks::calc::StreakState;

/// Number of days of activity markers retained for display.
pub const MARKER_RETENTION_DAYS: u64 = 30;

/// Store for per-actor streak state and daily activity markers.
pub struct StreakStore<'a> {
    conn: &'a Connection,
}

impl<'a> StreakStore<'a> {
    /// Create a new streak store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load an actor's streak state, or a fresh one if none is persisted.
    pub fn get_or_default(&self, actor_id: &Uuid) -> Result<StreakState, DatabaseError> {
        self.conn
            .query_row(
                "SELECT current_streak, best_streak, last_counted_day
                 FROM streak_states WHERE actor_id = ?1",
                params![actor_id.to_string()],
                |row| {
                    let last: Option<String> = row.get(2)?;
                    Ok(StreakState {
                        current_streak: row.get(0)?,
                        best_streak: row.get(1)?,
                        last_counted_day: last
                            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    })
                },
            )
            .optional()
            .map_err(DatabaseError::from_sqlite)
            .map(Option::unwrap_or_default)
    }

    /// Persist an actor's streak state.
    pub fn upsert(&self, actor_id: &Uuid, state: &StreakState) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO streak_states (actor_id, current_streak, best_streak, last_counted_day, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(actor_id) DO UPDATE SET
                     current_streak = excluded.current_streak,
                     best_streak = excluded.best_streak,
                     last_counted_day = excluded.last_counted_day,
                     updated_at = excluded.updated_at",
                params![
                    actor_id.to_string(),
                    state.current_streak,
                    state.best_streak,
                    state.last_counted_day.map(|d| d.to_string()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Record a per-day activity marker. Returns false when the day was
    /// already marked.
    pub fn mark_day(&self, actor_id: &Uuid, day: NaiveDate) -> Result<bool, DatabaseError> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO daily_activity (actor_id, day) VALUES (?1, ?2)",
                params![actor_id.to_string(), day.to_string()],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(inserted > 0)
    }

    /// Drop markers older than the retention window.
    pub fn prune_markers(&self, actor_id: &Uuid, today: NaiveDate) -> Result<(), DatabaseError> {
        let cutoff = today - chrono::Duration::days(MARKER_RETENTION_DAYS as i64);
        self.conn
            .execute(
                "DELETE FROM daily_activity WHERE actor_id = ?1 AND day < ?2",
                params![actor_id.to_string(), cutoff.to_string()],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Days with activity within the trailing window, newest first.
    pub fn recent_activity(
        &self,
        actor_id: &Uuid,
        days: u32,
    ) -> Result<Vec<NaiveDate>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT day FROM daily_activity WHERE actor_id = ?1
                 ORDER BY day DESC LIMIT ?2",
            )
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map(params![actor_id.to_string(), days], |row| {
                let raw: String = row.get(0)?;
                Ok(raw)
            })
            .map_err(DatabaseError::from_sqlite)?;

        let mut result = Vec::new();
        for row in rows {
            let raw = row.map_err(DatabaseError::from_sqlite)?;
            if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                result.push(date);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn day(ordinal: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, ordinal).unwrap()
    }

    #[test]
    fn test_state_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let store = StreakStore::new(db.connection());
        let actor = Uuid::new_v4();

        let mut state = store.get_or_default(&actor).unwrap();
        assert_eq!(state.current_streak, 0);

        state.advance(day(1));
        state.advance(day(2));
        store.upsert(&actor, &state).unwrap();

        let loaded = store.get_or_default(&actor).unwrap();
        assert_eq!(loaded.current_streak, 2);
        assert_eq!(loaded.last_counted_day, Some(day(2)));
    }

    #[test]
    fn test_mark_day_once() {
        let db = Database::open_in_memory().unwrap();
        let store = StreakStore::new(db.connection());
        let actor = Uuid::new_v4();

        assert!(store.mark_day(&actor, day(1)).unwrap());
        assert!(!store.mark_day(&actor, day(1)).unwrap());
    }

    #[test]
    fn test_prune_keeps_recent_markers() {
        let db = Database::open_in_memory().unwrap();
        let store = StreakStore::new(db.connection());
        let actor = Uuid::new_v4();

        store.mark_day(&actor, day(1)).unwrap();
        store
            .mark_day(&actor, day(1) + chrono::Duration::days(40))
            .unwrap();
        store
            .prune_markers(&actor, day(1) + chrono::Duration::days(40))
            .unwrap();

        let recent = store.recent_activity(&actor, 60).unwrap();
        assert_eq!(recent.len(), 1);
    }
}
