//! Evaluates incoming activity events against active enrollments.
//!
//! Runs after the base reward has committed. Failures here are isolated per
//! enrollment and never roll anything back; at worst a single enrollment
//! misses one advance and catches up on the next qualifying event.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::challenges::store::{ChallengeError, ChallengeStore};
use crate::challenges::types::{
    ActivityEvent, ChallengeDefinition, ChallengeEnrollment,
};
use crate::levels::LevelTable;
use crate::progress::dispatcher::RewardDispatcher;
use crate::progress::types::RewardOutcome;

/// Bound on optimistic-concurrency retries per enrollment.
const MAX_CONFLICT_RETRIES: u32 = 4;

/// A newly completed enrollment with its applied bonus reward.
#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub enrollment_id: Uuid,
    pub challenge_id: Uuid,
    pub title: String,
    pub bonus_xp: u32,
    pub badge_id: Option<String>,
    pub reward: RewardOutcome,
}

/// Tracker advancing every active enrollment of an actor on each event.
pub struct ChallengeTracker<'a> {
    conn: &'a Connection,
    levels: &'a LevelTable,
}

impl<'a> ChallengeTracker<'a> {
    /// Create a new tracker over a connection and level ladder.
    pub fn new(conn: &'a Connection, levels: &'a LevelTable) -> Self {
        Self { conn, levels }
    }

    /// Evaluate one event against all of the actor's active enrollments.
    /// Returns the enrollments this event completed. Infallible by design:
    /// per-enrollment failures are logged and skipped.
    pub fn observe(&self, actor_id: &Uuid, event: &ActivityEvent) -> Vec<CompletionSummary> {
        let store = ChallengeStore::new(self.conn);

        let rows = match store.active_with_definitions(actor_id) {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(%actor_id, %error, "failed to load active enrollments");
                return Vec::new();
            }
        };

        let mut completions = Vec::new();
        for (enrollment, definition) in rows {
            let enrollment_id = enrollment.id;
            match self.observe_one(actor_id, event, enrollment, &definition) {
                Ok(Some(summary)) => completions.push(summary),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%actor_id, %enrollment_id, %error, "enrollment evaluation failed");
                }
            }
        }
        completions
    }

    fn observe_one(
        &self,
        actor_id: &Uuid,
        event: &ActivityEvent,
        mut enrollment: ChallengeEnrollment,
        definition: &ChallengeDefinition,
    ) -> Result<Option<CompletionSummary>, ChallengeError> {
        let store = ChallengeStore::new(self.conn);

        for _ in 0..MAX_CONFLICT_RETRIES {
            let mut progress = enrollment.progress.clone();
            let evaluation = definition.kind.evaluate(event, &mut progress);

            if !evaluation.advanced {
                return Ok(None);
            }

            if evaluation.completed {
                // Bonus before the status flip. The event key is derived
                // from the enrollment, so if the flip is lost the row stays
                // Active, the next qualifying event completes it again and
                // the replayed dispatch is a no-op.
                let summary = self.dispatch_bonus(actor_id, &enrollment, definition)?;
                if store.complete(&enrollment.id, &progress, enrollment.version, Utc::now())? {
                    return Ok(Some(summary));
                }
            } else if store.persist_progress(&enrollment.id, &progress, enrollment.version)? {
                return Ok(None);
            }

            // Lost a concurrent update: reload and re-evaluate against the
            // fresh counters. A row someone else completed is done for good.
            match store.get_enrollment(&enrollment.id)? {
                Some(fresh) if fresh.status.is_active() => enrollment = fresh,
                _ => return Ok(None),
            }
        }

        Err(ChallengeError::Contended(enrollment.id))
    }

    /// Apply the completion bonus exactly once. The reward event key is
    /// derived from the enrollment identity, so a replayed completing event
    /// cannot re-grant even if it races the status transition.
    fn dispatch_bonus(
        &self,
        actor_id: &Uuid,
        enrollment: &ChallengeEnrollment,
        definition: &ChallengeDefinition,
    ) -> Result<CompletionSummary, ChallengeError> {
        let dispatcher = RewardDispatcher::new(self.conn, self.levels);
        let badges: Vec<String> = definition.badge_id.iter().cloned().collect();
        let event_key = format!("challenge:{}", enrollment.id);

        let reward = dispatcher.apply(actor_id, definition.bonus_xp, &badges, &event_key)?;
        if !reward.applied {
            tracing::debug!(enrollment_id = %enrollment.id, "completion bonus already journaled");
        }

        Ok(CompletionSummary {
            enrollment_id: enrollment.id,
            challenge_id: definition.id,
            title: definition.title.clone(),
            bonus_xp: definition.bonus_xp,
            badge_id: definition.badge_id.clone(),
            reward,
        })
    }
}
