//! Atomic, idempotent reward application.
//!
//! The dispatcher is the only writer of rewards. One call covers the event
//! journal insert, lazy profile creation, the in-place XP increment, the
//! level recompute and any badge grants, all inside a single IMMEDIATE
//! transaction, so a reward either lands completely or not at all.

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::levels::LevelTable;
use crate::progress::ledger::ProgressLedger;
use crate::progress::types::RewardOutcome;
use crate::storage::database::DatabaseError;

/// Applies XP deltas and badge grants to the progress ledger.
pub struct RewardDispatcher<'a> {
    conn: &'a Connection,
    levels: &'a LevelTable,
}

impl<'a> RewardDispatcher<'a> {
    /// Create a new dispatcher over a connection and level ladder.
    pub fn new(conn: &'a Connection, levels: &'a LevelTable) -> Self {
        Self { conn, levels }
    }

    /// Apply a reward in its own transaction.
    ///
    /// `event_key` is the stable identity of the rewarded event
    /// (`read:{actor}:{unit}`, `quiz:{result}`, `challenge:{enrollment}`).
    /// A key seen before leaves the ledger untouched and comes back with
    /// `applied = false`.
    pub fn apply(
        &self,
        actor_id: &Uuid,
        xp_delta: u32,
        badge_ids: &[String],
        event_key: &str,
    ) -> Result<RewardOutcome, DatabaseError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(DatabaseError::transaction)?;

        let outcome = self.apply_within(actor_id, xp_delta, badge_ids, event_key)?;

        tx.commit().map_err(DatabaseError::transaction)?;
        Ok(outcome)
    }

    /// Apply a reward inside a transaction the caller already holds. The
    /// event ingress uses this to fold the unit-completion insert and the
    /// streak update into the same commit.
    pub(crate) fn apply_within(
        &self,
        actor_id: &Uuid,
        xp_delta: u32,
        badge_ids: &[String],
        event_key: &str,
    ) -> Result<RewardOutcome, DatabaseError> {
        let ledger = ProgressLedger::new(self.conn);

        ledger.ensure_profile(actor_id, self.levels)?;

        if !ledger.journal_event(event_key, actor_id, xp_delta)? {
            // Replayed event: report current state, mutate nothing.
            let xp = ledger.xp_total(actor_id)?;
            return Ok(RewardOutcome {
                new_xp_total: xp,
                new_level_name: self.levels.resolve(xp).name.clone(),
                leveled_up: false,
                applied: false,
            });
        }

        let xp_before = ledger.xp_total(actor_id)?;
        ledger.add_xp(actor_id, xp_delta)?;
        let xp_after = ledger.xp_total(actor_id)?;

        let level_before = self.levels.resolve(xp_before);
        let level_after = self.levels.resolve(xp_after);
        let leveled_up = level_after.min_xp > level_before.min_xp;

        ledger.set_level(
            actor_id,
            &level_after.name,
            self.levels.next_level_xp(xp_after),
            Utc::now(),
        )?;

        for badge_id in badge_ids {
            if !ledger.grant_badge(actor_id, badge_id)? {
                tracing::debug!(%actor_id, badge_id, "duplicate badge grant suppressed");
            }
        }

        Ok(RewardOutcome {
            new_xp_total: xp_after,
            new_level_name: level_after.name.clone(),
            leveled_up,
            applied: true,
        })
    }
}
