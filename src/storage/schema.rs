//! Database schema definitions for the progress and rewards engine.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Actor progress ledger
CREATE TABLE IF NOT EXISTS actor_profiles (
    actor_id TEXT PRIMARY KEY,
    xp_total INTEGER NOT NULL DEFAULT 0 CHECK (xp_total >= 0),
    level_name TEXT NOT NULL,
    next_level_xp INTEGER,
    last_activity_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Level thresholds (reference data, seeded on first migration)
CREATE TABLE IF NOT EXISTS level_thresholds (
    name TEXT PRIMARY KEY,
    min_xp INTEGER NOT NULL UNIQUE
);

-- Reading units an actor has been rewarded for, at most once each
CREATE TABLE IF NOT EXISTS completed_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id TEXT NOT NULL,
    unit_id TEXT NOT NULL,
    book_id TEXT NOT NULL,
    chapter INTEGER NOT NULL,
    read_at TEXT NOT NULL,
    UNIQUE(actor_id, unit_id)
);

CREATE INDEX IF NOT EXISTS idx_completed_readings_actor ON completed_readings(actor_id);
CREATE INDEX IF NOT EXISTS idx_completed_readings_book ON completed_readings(actor_id, book_id);

-- Challenge definitions (immutable once published)
CREATE TABLE IF NOT EXISTS challenge_definitions (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    kind_json TEXT NOT NULL,
    bonus_xp INTEGER NOT NULL,
    badge_id TEXT,
    created_at TEXT NOT NULL
);

-- Per-actor challenge enrollments
CREATE TABLE IF NOT EXISTS challenge_enrollments (
    id TEXT PRIMARY KEY,
    actor_id TEXT NOT NULL,
    challenge_id TEXT NOT NULL REFERENCES challenge_definitions(id),
    status TEXT NOT NULL DEFAULT 'Active',
    progress_json TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    enrolled_at TEXT NOT NULL,
    completed_at TEXT,
    UNIQUE(actor_id, challenge_id)
);

CREATE INDEX IF NOT EXISTS idx_enrollments_actor_status ON challenge_enrollments(actor_id, status);

-- Quiz questions (read-only reference data)
CREATE TABLE IF NOT EXISTS quiz_questions (
    id TEXT PRIMARY KEY,
    reference_id TEXT NOT NULL,
    prompt TEXT NOT NULL,
    correct_answer TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quiz_questions_reference ON quiz_questions(reference_id);

-- Quiz grading audit rows
CREATE TABLE IF NOT EXISTS quiz_results (
    id TEXT PRIMARY KEY,
    actor_id TEXT NOT NULL,
    reference_id TEXT NOT NULL,
    total_answered INTEGER NOT NULL,
    correct_count INTEGER NOT NULL,
    xp_awarded INTEGER NOT NULL,
    percent REAL NOT NULL,
    graded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quiz_results_actor ON quiz_results(actor_id);

-- One-time badge grants
CREATE TABLE IF NOT EXISTS badge_grants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id TEXT NOT NULL,
    badge_id TEXT NOT NULL,
    granted_at TEXT NOT NULL,
    UNIQUE(actor_id, badge_id)
);

-- Reading streak state per actor
CREATE TABLE IF NOT EXISTS streak_states (
    actor_id TEXT PRIMARY KEY,
    current_streak INTEGER NOT NULL DEFAULT 0,
    best_streak INTEGER NOT NULL DEFAULT 0,
    last_counted_day TEXT,
    updated_at TEXT NOT NULL
);

-- Rolling per-day activity markers (kept for the dashboard streak widget)
CREATE TABLE IF NOT EXISTS daily_activity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id TEXT NOT NULL,
    day TEXT NOT NULL,
    UNIQUE(actor_id, day)
);

-- Reward event journal: one row per applied reward, keyed by event identity
CREATE TABLE IF NOT EXISTS reward_events (
    event_key TEXT PRIMARY KEY,
    actor_id TEXT NOT NULL,
    xp_delta INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reward_events_actor ON reward_events(actor_id);

-- Credential-to-actor mapping consumed by the identity resolver
CREATE TABLE IF NOT EXISTS auth_tokens (
    token TEXT PRIMARY KEY,
    actor_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// SQL for schema version tracking (migrations)
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

/// Default level ladder, inserted once on first migration. `min_xp` must stay
/// strictly increasing with a zero floor entry.
pub const SEED_LEVELS: &str = r#"
INSERT OR IGNORE INTO level_thresholds (name, min_xp) VALUES
    ('Aprendiz', 0),
    ('Intermediario', 100),
    ('Especialista', 200),
    ('Mestre', 500),
    ('Doutor', 1000);
"#;
