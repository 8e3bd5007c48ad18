//! Integration tests for challenge completion through the event ingress.

use jornada::challenges::{ChallengeDefinition, ChallengeKind, ChallengeStore};
use jornada::engine::{ProgressEngine, ReadingMeta};
use jornada::progress::ProgressLedger;
use jornada::quiz::{QuizAnswer, QuizQuestion, QuizStore};
use jornada::storage::{Database, RewardConfig};
use uuid::Uuid;

fn meta(book: &str, chapter: u32) -> ReadingMeta {
    ReadingMeta {
        book_name: book.to_string(),
        chapter_number: chapter,
    }
}

fn publish(db: &Database, kind: ChallengeKind, bonus_xp: u32, badge: Option<&str>) -> ChallengeDefinition {
    let store = ChallengeStore::new(db.connection());
    let definition = ChallengeDefinition::new(
        "Desafio".to_string(),
        kind,
        bonus_xp,
        badge.map(str::to_string),
    );
    store.publish(&definition).unwrap();
    definition
}

#[test]
fn test_read_book_challenge_completes_after_third_distinct_chapter() {
    let db = Database::open_in_memory().unwrap();
    let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
    let store = ChallengeStore::new(db.connection());
    let ledger = ProgressLedger::new(db.connection());
    let actor = Uuid::new_v4();

    let definition = publish(
        &db,
        ChallengeKind::ReadBook { book_id: "GEN".into(), chapter_count: 3 },
        100,
        Some("leitor-genesis"),
    );
    store.enroll(&actor, &definition.id).unwrap();

    let r1 = engine.record_reading(&actor, "GEN.1", &meta("Genesis", 1)).unwrap();
    assert!(r1.completed_challenges.is_empty());
    let r2 = engine.record_reading(&actor, "GEN.2", &meta("Genesis", 2)).unwrap();
    assert!(r2.completed_challenges.is_empty());

    let r3 = engine.record_reading(&actor, "GEN.3", &meta("Genesis", 3)).unwrap();
    assert_eq!(r3.completed_challenges.len(), 1);
    assert_eq!(r3.completed_challenges[0].bonus_xp, 100);

    // 3 chapters at 10 XP + 100 bonus
    assert_eq!(r3.xp_total, 130);
    assert_eq!(ledger.badges_for(&actor).unwrap().len(), 1);

    // The completing event delivered again: suppressed by the completed-unit
    // set, and the bonus is not re-granted
    let replay = engine.record_reading(&actor, "GEN.3", &meta("Genesis", 3)).unwrap();
    assert!(replay.already_done);
    assert!(replay.completed_challenges.is_empty());
    assert_eq!(replay.xp_total, 130);
    assert_eq!(ledger.badges_for(&actor).unwrap().len(), 1);
}

#[test]
fn test_chapters_outside_the_book_do_not_count() {
    let db = Database::open_in_memory().unwrap();
    let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
    let store = ChallengeStore::new(db.connection());
    let actor = Uuid::new_v4();

    let definition = publish(
        &db,
        ChallengeKind::ReadBook { book_id: "GEN".into(), chapter_count: 2 },
        100,
        None,
    );
    store.enroll(&actor, &definition.id).unwrap();

    engine.record_reading(&actor, "EXO.1", &meta("Exodo", 1)).unwrap();
    engine.record_reading(&actor, "EXO.2", &meta("Exodo", 2)).unwrap();
    let r = engine.record_reading(&actor, "GEN.1", &meta("Genesis", 1)).unwrap();
    assert!(r.completed_challenges.is_empty());

    let done = engine.record_reading(&actor, "GEN.2", &meta("Genesis", 2)).unwrap();
    assert_eq!(done.completed_challenges.len(), 1);
}

#[test]
fn test_quiz_book_challenge_counts_distinct_references() {
    let db = Database::open_in_memory().unwrap();
    let quiz_store = QuizStore::new(db.connection());
    for reference in ["GEN.1", "GEN.2"] {
        quiz_store
            .insert_question(&QuizQuestion {
                id: format!("{reference}-q1"),
                reference_id: reference.to_string(),
                prompt: "?".to_string(),
                correct_answer: "sim".to_string(),
            })
            .unwrap();
    }

    let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
    let store = ChallengeStore::new(db.connection());
    let actor = Uuid::new_v4();

    let definition = publish(
        &db,
        ChallengeKind::QuizBook { book_id: "GEN".into(), quiz_count: 2 },
        200,
        Some("sabio-genesis"),
    );
    store.enroll(&actor, &definition.id).unwrap();

    let answers = |reference: &str| {
        vec![QuizAnswer {
            question_id: format!("{reference}-q1"),
            answer: "sim".to_string(),
        }]
    };

    let q1 = engine.grade_quiz(&actor, "GEN.1", &answers("GEN.1")).unwrap();
    assert!(q1.completed_challenges.is_empty());

    // Same reference again advances nothing
    let repeat = engine.grade_quiz(&actor, "GEN.1", &answers("GEN.1")).unwrap();
    assert!(repeat.completed_challenges.is_empty());

    let q2 = engine.grade_quiz(&actor, "GEN.2", &answers("GEN.2")).unwrap();
    assert_eq!(q2.completed_challenges.len(), 1);
    assert_eq!(q2.completed_challenges[0].badge_id.as_deref(), Some("sabio-genesis"));
}

#[test]
fn test_enrollment_after_partial_progress_starts_fresh() {
    let db = Database::open_in_memory().unwrap();
    let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
    let store = ChallengeStore::new(db.connection());
    let actor = Uuid::new_v4();

    // Chapters read before enrolling do not count toward the challenge
    engine.record_reading(&actor, "GEN.1", &meta("Genesis", 1)).unwrap();

    let definition = publish(
        &db,
        ChallengeKind::ReadBook { book_id: "GEN".into(), chapter_count: 2 },
        100,
        None,
    );
    store.enroll(&actor, &definition.id).unwrap();

    let r2 = engine.record_reading(&actor, "GEN.2", &meta("Genesis", 2)).unwrap();
    assert!(r2.completed_challenges.is_empty());
    let r3 = engine.record_reading(&actor, "GEN.3", &meta("Genesis", 3)).unwrap();
    assert_eq!(r3.completed_challenges.len(), 1);
}
