//! Event ingress: the two entry points converting raw learning events into
//! rewarded state.
//!
//! Control flow per event: validate, dedupe, base reward (one transaction
//! shared with the unit insert and streak update), then challenge tracking
//! with bonus rewards for any completions. The base reward commits before
//! the tracker runs, so tracker failures can never take it back.

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use crate::challenges::tracker::{ChallengeTracker, CompletionSummary};
use crate::challenges::types::ActivityEvent;
use crate::identity::{IdentityError, IdentityResolver};
use crate::levels::LevelTable;
use crate::progress::dispatcher::RewardDispatcher;
use crate::progress::ledger::{split_unit_id, ProgressLedger};
use crate::progress::types::ActorProfile;
use crate::quiz::store::QuizStore;
use crate::quiz::types::{grade, QuizAnswer, QuizResult};
use crate::storage::config::RewardConfig;
use crate::storage::database::{Database, DatabaseError};
use crate::streaks::store::StreakStore;

/// Engine errors surfaced to the inbound interface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no resolvable actor identity")]
    Auth,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage was too contended to serve the call. Safe to retry.
    #[error("storage busy, retry: {0}")]
    TransientStorage(String),

    #[error(transparent)]
    Storage(DatabaseError),
}

impl From<DatabaseError> for EngineError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Busy(msg) => EngineError::TransientStorage(msg),
            other => EngineError::Storage(other),
        }
    }
}

impl From<IdentityError> for EngineError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Unresolved => EngineError::Auth,
            IdentityError::Database(db) => db.into(),
        }
    }
}

/// Client-supplied display metadata accompanying a reading event.
#[derive(Debug, Clone)]
pub struct ReadingMeta {
    pub book_name: String,
    pub chapter_number: u32,
}

/// Response of [`ProgressEngine::record_reading`].
#[derive(Debug, Clone)]
pub struct ReadingReceipt {
    pub message: String,
    pub xp_awarded: u32,
    pub xp_total: u32,
    pub leveled_up: bool,
    pub level_name: String,
    pub already_done: bool,
    pub completed_challenges: Vec<CompletionSummary>,
}

/// Response of [`ProgressEngine::grade_quiz`].
#[derive(Debug, Clone)]
pub struct QuizReceipt {
    pub correct_count: u32,
    pub total_answered: u32,
    pub xp_awarded: u32,
    pub xp_total: u32,
    pub leveled_up: bool,
    pub level_name: String,
    pub completed_challenges: Vec<CompletionSummary>,
}

/// The progress and rewards engine. Stateless between calls; every
/// invocation coordinates exclusively through storage.
pub struct ProgressEngine<'a> {
    conn: &'a Connection,
    levels: LevelTable,
    rewards: RewardConfig,
}

impl<'a> ProgressEngine<'a> {
    /// Build an engine over an open database, loading the level ladder.
    pub fn new(db: &'a Database, rewards: RewardConfig) -> Result<Self, EngineError> {
        Ok(Self {
            conn: db.connection(),
            levels: db.level_table()?,
            rewards,
        })
    }

    /// Map caller credentials to the acting identity.
    pub fn authenticate(
        &self,
        resolver: &dyn IdentityResolver,
        credential: Option<&str>,
    ) -> Result<Uuid, EngineError> {
        let credential = credential.ok_or(EngineError::Auth)?;
        Ok(resolver.resolve(credential)?)
    }

    /// Record one chapter read. Idempotent: re-reading a completed unit
    /// reports `already_done` and changes nothing.
    pub fn record_reading(
        &self,
        actor_id: &Uuid,
        unit_id: &str,
        meta: &ReadingMeta,
    ) -> Result<ReadingReceipt, EngineError> {
        let (book_id, chapter) = split_unit_id(unit_id)
            .ok_or_else(|| EngineError::Validation(format!("malformed unit id '{unit_id}'")))?;
        let unit_id = format!("{book_id}.{chapter}");

        let ledger = ProgressLedger::new(self.conn);

        // Fast path; the reward journal below remains the authoritative guard
        if ledger.has_completed_unit(actor_id, &unit_id)? {
            return self.already_done_receipt(actor_id, meta);
        }

        let today = Utc::now().date_naive();
        let dispatcher = RewardDispatcher::new(self.conn, &self.levels);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(DatabaseError::transaction)
            .map_err(EngineError::from)?;

        let event_key = format!("read:{actor_id}:{unit_id}");
        let outcome =
            dispatcher.apply_within(actor_id, self.rewards.xp_per_chapter, &[], &event_key)?;

        if !outcome.applied {
            // Lost a concurrent duplicate of the same unit
            tx.commit()
                .map_err(DatabaseError::transaction)
                .map_err(EngineError::from)?;
            return self.already_done_receipt(actor_id, meta);
        }

        ledger.insert_completed_unit(actor_id, &unit_id, &book_id, chapter)?;

        let streaks = StreakStore::new(self.conn);
        let mut streak = streaks.get_or_default(actor_id)?;
        if streak.advance(today) {
            streaks.upsert(actor_id, &streak)?;
        }
        streaks.mark_day(actor_id, today)?;
        streaks.prune_markers(actor_id, today)?;

        tx.commit()
            .map_err(DatabaseError::transaction)
            .map_err(EngineError::from)?;

        tracing::info!(%actor_id, unit_id, xp = self.rewards.xp_per_chapter, "reading rewarded");

        let tracker = ChallengeTracker::new(self.conn, &self.levels);
        let completed_challenges = tracker.observe(
            actor_id,
            &ActivityEvent::read(unit_id.clone(), book_id, today),
        );

        let profile = self.require_profile(actor_id)?;
        let leveled_up =
            outcome.leveled_up || completed_challenges.iter().any(|c| c.reward.leveled_up);

        Ok(ReadingReceipt {
            message: format!("{} {} registered", meta.book_name, meta.chapter_number),
            xp_awarded: self.rewards.xp_per_chapter,
            xp_total: profile.xp_total,
            leveled_up,
            level_name: profile.level_name,
            already_done: false,
            completed_challenges,
        })
    }

    /// Grade one quiz submission. Assumes at most one grading call per
    /// submission; callers that retry must dedupe upstream.
    pub fn grade_quiz(
        &self,
        actor_id: &Uuid,
        reference_id: &str,
        answers: &[QuizAnswer],
    ) -> Result<QuizReceipt, EngineError> {
        if answers.is_empty() {
            return Err(EngineError::Validation("no answers submitted".to_string()));
        }

        let quizzes = QuizStore::new(self.conn);
        let questions = quizzes.questions_for_reference(reference_id)?;
        let sheet = grade(&questions, answers, self.rewards.xp_per_correct_answer);

        let result = QuizResult {
            id: Uuid::new_v4(),
            actor_id: *actor_id,
            reference_id: reference_id.to_string(),
            total_answered: sheet.total_answered,
            correct_count: sheet.correct_count,
            xp_awarded: sheet.xp_awarded,
            percent: sheet.percent,
            graded_at: Utc::now(),
        };

        let dispatcher = RewardDispatcher::new(self.conn, &self.levels);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(DatabaseError::transaction)
            .map_err(EngineError::from)?;

        quizzes.insert_result(&result)?;
        let outcome = dispatcher.apply_within(
            actor_id,
            sheet.xp_awarded,
            &[],
            &format!("quiz:{}", result.id),
        )?;

        tx.commit()
            .map_err(DatabaseError::transaction)
            .map_err(EngineError::from)?;

        tracing::info!(
            %actor_id,
            reference_id,
            correct = sheet.correct_count,
            xp = sheet.xp_awarded,
            "quiz graded"
        );

        let today = Utc::now().date_naive();
        let tracker = ChallengeTracker::new(self.conn, &self.levels);
        let completed_challenges =
            tracker.observe(actor_id, &ActivityEvent::quiz(reference_id.to_string(), today));

        let profile = self.require_profile(actor_id)?;
        let leveled_up =
            outcome.leveled_up || completed_challenges.iter().any(|c| c.reward.leveled_up);

        Ok(QuizReceipt {
            correct_count: sheet.correct_count,
            total_answered: sheet.total_answered,
            xp_awarded: sheet.xp_awarded,
            xp_total: profile.xp_total,
            leveled_up,
            level_name: profile.level_name,
            completed_challenges,
        })
    }

    /// Current profile of an actor, if any event was ever recorded.
    pub fn profile(&self, actor_id: &Uuid) -> Result<Option<ActorProfile>, EngineError> {
        Ok(ProgressLedger::new(self.conn).get_profile(actor_id)?)
    }

    fn already_done_receipt(
        &self,
        actor_id: &Uuid,
        meta: &ReadingMeta,
    ) -> Result<ReadingReceipt, EngineError> {
        let profile = self.require_profile(actor_id)?;
        Ok(ReadingReceipt {
            message: format!(
                "{} {} was already registered",
                meta.book_name, meta.chapter_number
            ),
            xp_awarded: 0,
            xp_total: profile.xp_total,
            leveled_up: false,
            level_name: profile.level_name,
            already_done: true,
            completed_challenges: Vec::new(),
        })
    }

    fn require_profile(&self, actor_id: &Uuid) -> Result<ActorProfile, EngineError> {
        ProgressLedger::new(self.conn)
            .get_profile(actor_id)?
            .ok_or_else(|| {
                EngineError::Storage(DatabaseError::QueryFailed(format!(
                    "profile missing for actor {actor_id}"
                )))
            })
    }
}
