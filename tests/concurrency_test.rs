//! Concurrency tests: several writers over one file-backed database must
//! never lose an XP increment or reward the same event twice.

use std::thread;
use std::time::Duration;

use jornada::engine::{EngineError, ProgressEngine, ReadingMeta, ReadingReceipt};
use jornada::progress::ProgressLedger;
use jornada::storage::{Database, RewardConfig};
use tempfile::TempDir;
use uuid::Uuid;

fn meta(chapter: u32) -> ReadingMeta {
    ReadingMeta {
        book_name: "Salmos".to_string(),
        chapter_number: chapter,
    }
}

/// Retry transient lock errors the way a real caller would.
fn record_with_retry(
    engine: &ProgressEngine,
    actor: &Uuid,
    unit_id: &str,
    chapter: u32,
) -> ReadingReceipt {
    loop {
        match engine.record_reading(actor, unit_id, &meta(chapter)) {
            Ok(receipt) => return receipt,
            Err(EngineError::TransientStorage(_)) => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn test_parallel_distinct_readings_lose_no_increment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("progress.db");

    // Migrate once before the writers race
    let db = Database::open(&path).unwrap();
    drop(db);

    let actor = Uuid::new_v4();
    let threads = 4;
    let chapters_per_thread = 5u32;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let path = path.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
                for i in 0..chapters_per_thread {
                    let chapter = t * chapters_per_thread + i + 1;
                    let receipt =
                        record_with_retry(&engine, &actor, &format!("SAL.{chapter}"), chapter);
                    assert!(!receipt.already_done);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let db = Database::open(&path).unwrap();
    let ledger = ProgressLedger::new(db.connection());
    let expected = threads * chapters_per_thread * RewardConfig::default().xp_per_chapter;
    assert_eq!(ledger.xp_total(&actor).unwrap(), expected);
}

#[test]
fn test_lock_held_past_timeout_surfaces_as_retryable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("progress.db");

    let db = Database::open(&path).unwrap();
    let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
    let actor = Uuid::new_v4();

    // A foreign writer holds the database past the busy timeout
    let blocker = rusqlite::Connection::open(&path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

    let result = engine.record_reading(&actor, "GEN.1", &meta(1));
    assert!(
        matches!(result, Err(EngineError::TransientStorage(_))),
        "expected a retryable error, got: {result:?}"
    );

    // Once the lock clears, the same call goes through
    blocker.execute_batch("COMMIT").unwrap();
    let receipt = engine.record_reading(&actor, "GEN.1", &meta(1)).unwrap();
    assert!(!receipt.already_done);
}

#[test]
fn test_racing_duplicates_reward_exactly_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("progress.db");

    let db = Database::open(&path).unwrap();
    drop(db);

    let actor = Uuid::new_v4();
    let threads = 6;

    // Every thread submits the same unit; exactly one may win
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let engine = ProgressEngine::new(&db, RewardConfig::default()).unwrap();
                let receipt = record_with_retry(&engine, &actor, "GEN.1", 1);
                u32::from(!receipt.already_done)
            })
        })
        .collect();

    let wins: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(wins, 1);

    let db = Database::open(&path).unwrap();
    let ledger = ProgressLedger::new(db.connection());
    assert_eq!(
        ledger.xp_total(&actor).unwrap(),
        RewardConfig::default().xp_per_chapter
    );
    assert_eq!(ledger.completed_units(&actor).unwrap().len(), 1);
}
