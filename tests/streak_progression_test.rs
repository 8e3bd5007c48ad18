//! Integration tests for streak persistence and streak-bound challenges.

use chrono::NaiveDate;
use jornada::challenges::tracker::ChallengeTracker;
use jornada::challenges::types::ActivityEvent;
use jornada::challenges::{ChallengeDefinition, ChallengeKind, ChallengeStore};
use jornada::engine::{ProgressEngine, ReadingMeta};
use jornada::storage::{Database, RewardConfig};
use jornada::streaks::StreakStore;
use uuid::Uuid;

fn day(ordinal: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, ordinal).unwrap()
}

fn read_event(unit: &str, d: u32) -> ActivityEvent {
    let (book, _) = unit.split_once('.').unwrap();
    ActivityEvent::read(unit.to_string(), book.to_string(), day(d))
}

#[test]
fn test_consecutive_days_extend_the_persisted_streak() {
    let db = Database::open_in_memory().unwrap();
    let store = StreakStore::new(db.connection());
    let actor = Uuid::new_v4();

    let mut state = store.get_or_default(&actor).unwrap();
    assert!(state.advance(day(10)));
    store.upsert(&actor, &state).unwrap();

    let mut state = store.get_or_default(&actor).unwrap();
    assert!(state.advance(day(11)));
    store.upsert(&actor, &state).unwrap();

    let loaded = store.get_or_default(&actor).unwrap();
    assert_eq!(loaded.current_streak, 2);
    assert_eq!(loaded.best_streak, 2);
    assert_eq!(loaded.last_counted_day, Some(day(11)));
}

#[test]
fn test_missed_day_resets_but_best_streak_survives() {
    let db = Database::open_in_memory().unwrap();
    let store = StreakStore::new(db.connection());
    let actor = Uuid::new_v4();

    let mut state = store.get_or_default(&actor).unwrap();
    state.advance(day(10));
    state.advance(day(11));
    state.advance(day(12));
    // Day 13 missed
    state.advance(day(14));
    store.upsert(&actor, &state).unwrap();

    let loaded = store.get_or_default(&actor).unwrap();
    assert_eq!(loaded.current_streak, 1);
    assert_eq!(loaded.best_streak, 3);
}

#[test]
fn test_engine_reading_marks_the_day_once() {
    let db = Database::open_in_memory().unwrap();
    let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
    let store = StreakStore::new(db.connection());
    let actor = Uuid::new_v4();

    let meta = ReadingMeta {
        book_name: "Genesis".to_string(),
        chapter_number: 1,
    };
    engine.record_reading(&actor, "GEN.1", &meta).unwrap();
    engine.record_reading(&actor, "GEN.2", &meta).unwrap();

    let state = store.get_or_default(&actor).unwrap();
    assert_eq!(state.current_streak, 1);
    assert_eq!(state.best_streak, 1);

    let recent = store.recent_activity(&actor, 7).unwrap();
    assert_eq!(recent.len(), 1);
}

#[test]
fn test_streak_challenge_completes_on_the_target_day() {
    let db = Database::open_in_memory().unwrap();
    let store = ChallengeStore::new(db.connection());
    let levels = db.level_table().unwrap();
    let tracker = ChallengeTracker::new(db.connection(), &levels);
    let actor = Uuid::new_v4();

    let definition = ChallengeDefinition::new(
        "Tres dias seguidos".to_string(),
        ChallengeKind::ReadingStreak { consecutive_days: 3 },
        150,
        Some("constancia".to_string()),
    );
    store.publish(&definition).unwrap();
    store.enroll(&actor, &definition.id).unwrap();

    assert!(tracker.observe(&actor, &read_event("GEN.1", 1)).is_empty());
    // Second read on day 1 does not shortcut the streak
    assert!(tracker.observe(&actor, &read_event("GEN.2", 1)).is_empty());
    assert!(tracker.observe(&actor, &read_event("GEN.3", 2)).is_empty());

    let completions = tracker.observe(&actor, &read_event("GEN.4", 3));
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].bonus_xp, 150);
    assert_eq!(completions[0].badge_id.as_deref(), Some("constancia"));

    // Further days land on a completed enrollment
    assert!(tracker.observe(&actor, &read_event("GEN.5", 4)).is_empty());
}

#[test]
fn test_streak_challenge_gap_restarts_the_count() {
    let db = Database::open_in_memory().unwrap();
    let store = ChallengeStore::new(db.connection());
    let levels = db.level_table().unwrap();
    let tracker = ChallengeTracker::new(db.connection(), &levels);
    let actor = Uuid::new_v4();

    let definition = ChallengeDefinition::new(
        "Tres dias seguidos".to_string(),
        ChallengeKind::ReadingStreak { consecutive_days: 3 },
        150,
        None,
    );
    store.publish(&definition).unwrap();
    store.enroll(&actor, &definition.id).unwrap();

    tracker.observe(&actor, &read_event("GEN.1", 1));
    tracker.observe(&actor, &read_event("GEN.2", 2));
    // Day 3 missed; days 4-5 only reach 2
    tracker.observe(&actor, &read_event("GEN.3", 4));
    assert!(tracker.observe(&actor, &read_event("GEN.4", 5)).is_empty());

    let completions = tracker.observe(&actor, &read_event("GEN.5", 6));
    assert_eq!(completions.len(), 1);
}
