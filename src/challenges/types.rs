//! Challenge type definitions and the per-enrollment state machine.
//!
//! Each challenge kind is one variant of a tagged enum carrying its target,
//! and its progress payload is the matching variant of a second enum, so a
//! single [`ChallengeKind::evaluate`] covers every kind.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// What a challenge asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Read a number of distinct chapters of one book
    ReadBook { book_id: String, chapter_count: u32 },
    /// Finish a number of distinct quizzes of one book
    QuizBook { book_id: String, quiz_count: u32 },
    /// Keep a reading streak alive for consecutive days
    ReadingStreak { consecutive_days: u32 },
}

impl ChallengeKind {
    /// Get display name for the challenge kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            ChallengeKind::ReadBook { .. } => "Book Reading",
            ChallengeKind::QuizBook { .. } => "Book Quizzes",
            ChallengeKind::ReadingStreak { .. } => "Reading Streak",
        }
    }

    /// Advance `progress` with one event. No-op when the event does not
    /// match this kind's domain or when `progress` carries a foreign payload.
    pub fn evaluate(&self, event: &ActivityEvent, progress: &mut ChallengeProgress) -> Evaluation {
        match (self, progress, event) {
            (
                ChallengeKind::ReadBook { book_id, chapter_count },
                ChallengeProgress::ReadBook { chapters_read, counted_units },
                ActivityEvent::Read { unit_id, book_id: event_book, .. },
            ) if book_id == event_book => {
                if !counted_units.insert(unit_id.clone()) {
                    return Evaluation::unchanged();
                }
                *chapters_read += 1;
                Evaluation::advanced(*chapters_read >= *chapter_count)
            }

            (
                ChallengeKind::QuizBook { book_id, quiz_count },
                ChallengeProgress::QuizBook { quizzes_done, counted_refs },
                ActivityEvent::Quiz { reference_id, book_id: event_book, .. },
            ) if book_id == event_book => {
                if !counted_refs.insert(reference_id.clone()) {
                    return Evaluation::unchanged();
                }
                *quizzes_done += 1;
                Evaluation::advanced(*quizzes_done >= *quiz_count)
            }

            (
                ChallengeKind::ReadingStreak { consecutive_days: target },
                ChallengeProgress::ReadingStreak { consecutive_days, last_counted_day },
                ActivityEvent::Read { day, .. },
            ) => {
                match *last_counted_day {
                    Some(last) if last == *day => return Evaluation::unchanged(),
                    Some(last) if Some(last) == day.checked_sub_days(Days::new(1)) => {
                        *consecutive_days += 1;
                    }
                    _ => *consecutive_days = 1,
                }
                *last_counted_day = Some(*day);
                Evaluation::advanced(*consecutive_days >= *target)
            }

            _ => Evaluation::unchanged(),
        }
    }
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Kind-specific progress counters, persisted as JSON on the enrollment.
/// The counted-id sets prevent re-counting a replayed unit or reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeProgress {
    ReadBook {
        chapters_read: u32,
        counted_units: BTreeSet<String>,
    },
    QuizBook {
        quizzes_done: u32,
        counted_refs: BTreeSet<String>,
    },
    ReadingStreak {
        consecutive_days: u32,
        last_counted_day: Option<NaiveDate>,
    },
}

impl ChallengeProgress {
    /// Fresh progress payload matching a challenge kind.
    pub fn initial_for(kind: &ChallengeKind) -> Self {
        match kind {
            ChallengeKind::ReadBook { .. } => ChallengeProgress::ReadBook {
                chapters_read: 0,
                counted_units: BTreeSet::new(),
            },
            ChallengeKind::QuizBook { .. } => ChallengeProgress::QuizBook {
                quizzes_done: 0,
                counted_refs: BTreeSet::new(),
            },
            ChallengeKind::ReadingStreak { .. } => ChallengeProgress::ReadingStreak {
                consecutive_days: 0,
                last_counted_day: None,
            },
        }
    }
}

/// Outcome of evaluating one event against one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Whether the progress payload changed
    pub advanced: bool,
    /// Whether the target was reached
    pub completed: bool,
}

impl Evaluation {
    fn unchanged() -> Self {
        Self { advanced: false, completed: false }
    }

    fn advanced(completed: bool) -> Self {
        Self { advanced: true, completed }
    }
}

/// One learning/engagement event, normalized by the ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    Read {
        unit_id: String,
        book_id: String,
        day: NaiveDate,
    },
    Quiz {
        reference_id: String,
        book_id: String,
        day: NaiveDate,
    },
}

impl ActivityEvent {
    pub fn read(unit_id: String, book_id: String, day: NaiveDate) -> Self {
        ActivityEvent::Read { unit_id, book_id, day }
    }

    /// Quiz references share the `"<book>.<n>"` shape of unit ids; the book
    /// prefix scopes book-bound quiz challenges.
    pub fn quiz(reference_id: String, day: NaiveDate) -> Self {
        let book_id = reference_id
            .split_once('.')
            .map(|(book, _)| book.to_uppercase())
            .unwrap_or_else(|| reference_id.to_uppercase());
        ActivityEvent::Quiz { reference_id, book_id, day }
    }
}

/// A published challenge. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeDefinition {
    pub id: Uuid,
    pub title: String,
    pub kind: ChallengeKind,
    pub bonus_xp: u32,
    pub badge_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChallengeDefinition {
    /// Create a new definition ready to publish.
    pub fn new(title: String, kind: ChallengeKind, bonus_xp: u32, badge_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            kind,
            bonus_xp,
            badge_id,
            created_at: Utc::now(),
        }
    }
}

/// Enrollment status. Completed is terminal; there is no reactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Active,
    Completed,
}

impl EnrollmentStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, EnrollmentStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "Active",
            EnrollmentStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An actor's tracked progress toward one challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeEnrollment {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub challenge_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress: ChallengeProgress,
    /// Optimistic concurrency stamp, bumped on every progress write
    pub version: i64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
