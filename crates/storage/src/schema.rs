//! Versioned schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`; each entry in
//! [`MIGRATIONS`] moves the database up one version. Child tables carry no
//! foreign key constraints on purpose: aggregate deletes are spelled out
//! explicitly inside one transaction per operation.

use log::info;
use rusqlite::Connection;

/// Version 1: the settings singleton and a minimal routine list.
const V1: &str = "
CREATE TABLE settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    theme TEXT NOT NULL,
    language TEXT NOT NULL,
    units TEXT NOT NULL,
    stats_range_days INTEGER NOT NULL
);

CREATE TABLE routines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

/// Version 2: ordering and audit columns on routines (backfilled by
/// creation time, id as tiebreaker) plus the full catalog, template,
/// and history tables.
const V2: &str = "
ALTER TABLE routines ADD COLUMN updated_at TEXT;
ALTER TABLE routines ADD COLUMN position INTEGER;

UPDATE routines SET position = (
    SELECT COUNT(*) FROM routines r2
    WHERE r2.created_at < routines.created_at
       OR (r2.created_at = routines.created_at AND r2.id < routines.id)
);
UPDATE routines SET updated_at = created_at WHERE updated_at IS NULL;

CREATE TABLE exercises (
    id TEXT PRIMARY KEY,
    base_name TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    muscles TEXT NOT NULL,
    equipment TEXT NOT NULL,
    metric_type TEXT NOT NULL,
    is_custom INTEGER NOT NULL,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX idx_exercises_normalized_name ON exercises(normalized_name);

CREATE TABLE exercise_translations (
    exercise_id TEXT NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (exercise_id, language)
);

CREATE TABLE exercise_favorites (
    exercise_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE exercise_recents (
    exercise_id TEXT PRIMARY KEY,
    last_used_at TEXT NOT NULL
);

CREATE TABLE routine_tags (
    routine_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (routine_id, tag)
);

CREATE TABLE routine_exercises (
    routine_id TEXT NOT NULL,
    exercise_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (routine_id, exercise_id)
);

CREATE TABLE routine_exercise_defaults (
    routine_id TEXT NOT NULL,
    exercise_id TEXT NOT NULL,
    defaults TEXT NOT NULL,
    PRIMARY KEY (routine_id, exercise_id)
);

CREATE TABLE routine_versions (
    id TEXT PRIMARY KEY,
    routine_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    name TEXT NOT NULL,
    snapshot TEXT NOT NULL
);
CREATE INDEX idx_routine_versions_routine_id ON routine_versions(routine_id);

CREATE TABLE workouts (
    id TEXT PRIMARY KEY,
    routine_id TEXT,
    routine_name TEXT,
    tags TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT NOT NULL
);
CREATE INDEX idx_workouts_ended_at ON workouts(ended_at);
CREATE INDEX idx_workouts_routine_id ON workouts(routine_id);

CREATE TABLE workout_exercises (
    id TEXT PRIMARY KEY,
    workout_id TEXT NOT NULL,
    exercise_id TEXT NOT NULL,
    name TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX idx_workout_exercises_workout_id ON workout_exercises(workout_id);
CREATE INDEX idx_workout_exercises_exercise_id ON workout_exercises(exercise_id);

CREATE TABLE workout_sets (
    workout_exercise_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    weight REAL,
    reps INTEGER,
    duration INTEGER,
    distance REAL,
    rpe INTEGER,
    completed INTEGER NOT NULL,
    PRIMARY KEY (workout_exercise_id, position)
);
";

pub const MIGRATIONS: &[&str] = &[V1, V2];

/// Brings the database up to the latest schema version. Each pending
/// migration runs in its own transaction and bumps `user_version` on
/// success.
pub fn apply_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let version: usize = conn.query_row("PRAGMA user_version", [], |row| {
        row.get::<_, i64>(0).map(|v| usize::try_from(v).unwrap_or(0))
    })?;
    for (i, migration) in MIGRATIONS.iter().enumerate().skip(version) {
        info!("migrating database schema to version {}", i + 1);
        let tx = conn.transaction()?;
        tx.execute_batch(migration)?;
        tx.pragma_update(None, "user_version", i + 1)?;
        tx.commit()?;
    }
    Ok(())
}
