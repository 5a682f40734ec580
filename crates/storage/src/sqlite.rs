//! SQLite-backed store for the relational tables.
//!
//! Every multi-step mutation runs inside one transaction; a failure rolls
//! the whole operation back so no partial rows become visible.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, SecondsFormat, Utc};
use entreno_domain::{
    CreateError, DeleteError, Direction, Exercise, ExerciseDefaults, ExerciseFilter, ExerciseID,
    ExerciseRepository, ExerciseSource, ExerciseTranslation, ExerciseWithTranslations, Favorite,
    ImportPlan, MetricType, Name, NewWorkout, ReadError, Recent, Routine, RoutineDetail,
    RoutineExercise, RoutineID, RoutineRepository, RoutineSnapshot, RoutineVersion,
    RoutineVersionID, Rpe, Settings, SettingsRepository, StorageError, UpdateError, Workout,
    WorkoutExercise, WorkoutExerciseID, WorkoutID, WorkoutRepository, WorkoutSet,
};
use log::info;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use uuid::Uuid;

use crate::schema;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

#[derive(thiserror::Error, Debug)]
enum TxError {
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("duplicate name")]
    Duplicate,
    #[error("not found")]
    NotFound,
    #[error("connection lock poisoned")]
    Lock,
}

impl TxError {
    fn storage(self) -> StorageError {
        StorageError::Transaction(self.to_string())
    }
}

impl From<TxError> for ReadError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::NotFound => ReadError::NotFound,
            other => ReadError::Storage(other.storage()),
        }
    }
}

impl From<TxError> for CreateError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Duplicate => CreateError::DuplicateName,
            other => CreateError::Storage(other.storage()),
        }
    }
}

impl From<TxError> for UpdateError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Duplicate => UpdateError::DuplicateName,
            TxError::NotFound => UpdateError::NotFound,
            other => UpdateError::Storage(other.storage()),
        }
    }
}

impl From<TxError> for DeleteError {
    fn from(err: TxError) -> Self {
        DeleteError::Storage(err.storage())
    }
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| StorageError::Transaction(err.to_string()))?;
        }
        let conn = Connection::open(path)
            .map_err(|err| StorageError::Transaction(err.to_string()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|err| StorageError::Transaction(err.to_string()))?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> Result<Self, StorageError> {
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(|err| StorageError::Transaction(err.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| StorageError::Transaction(err.to_string()))?;
        schema::apply_migrations(&mut conn)
            .map_err(|err| StorageError::Transaction(err.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn write<T>(&self, f: impl FnOnce(&Transaction) -> Result<T, TxError>) -> Result<T, TxError> {
        let mut conn = self.conn.lock().map_err(|_| TxError::Lock)?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T, TxError>) -> Result<T, TxError> {
        let conn = self.conn.lock().map_err(|_| TxError::Lock)?;
        f(&conn)
    }
}

fn encode_ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_ts(value: &str) -> Result<DateTime<Utc>, TxError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| TxError::Corrupt(format!("timestamp {value:?}: {err}")))
}

fn decode_uuid(value: &str) -> Result<Uuid, TxError> {
    Uuid::parse_str(value).map_err(|err| TxError::Corrupt(format!("id {value:?}: {err}")))
}

fn decode_name(value: &str) -> Result<Name, TxError> {
    Name::new(value).map_err(|err| TxError::Corrupt(format!("name {value:?}: {err}")))
}

fn decode_metric(value: &str) -> Result<MetricType, TxError> {
    value
        .parse()
        .map_err(|_| TxError::Corrupt(format!("metric type {value:?}")))
}

fn decode_source(value: &str) -> Result<ExerciseSource, TxError> {
    value
        .parse()
        .map_err(|_| TxError::Corrupt(format!("exercise source {value:?}")))
}

type ExerciseRow = (
    String,
    String,
    String,
    String,
    String,
    bool,
    String,
    String,
);

const EXERCISE_COLUMNS: &str =
    "id, base_name, muscles, equipment, metric_type, is_custom, source, created_at";

fn exercise_from_row(row: &rusqlite::Row) -> rusqlite::Result<ExerciseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn exercise_from_parts(parts: ExerciseRow) -> Result<Exercise, TxError> {
    let (id, base_name, muscles, equipment, metric, custom, source, created_at) = parts;
    Ok(Exercise {
        id: decode_uuid(&id)?.into(),
        name: decode_name(&base_name)?,
        muscles: serde_json::from_str(&muscles)?,
        equipment: serde_json::from_str(&equipment)?,
        metric: decode_metric(&metric)?,
        custom,
        source: decode_source(&source)?,
        created_at: decode_ts(&created_at)?,
    })
}

fn insert_exercise(conn: &Connection, exercise: &Exercise) -> Result<(), TxError> {
    conn.execute(
        "INSERT INTO exercises
         (id, base_name, normalized_name, muscles, equipment, metric_type, is_custom, source, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            exercise.id.to_string(),
            exercise.name.as_ref(),
            exercise.normalized_name(),
            serde_json::to_string(&exercise.muscles)?,
            serde_json::to_string(&exercise.equipment)?,
            exercise.metric.to_string(),
            exercise.custom,
            exercise.source.to_string(),
            encode_ts(exercise.created_at),
        ],
    )?;
    Ok(())
}

fn insert_translation(conn: &Connection, translation: &ExerciseTranslation) -> Result<(), TxError> {
    conn.execute(
        "INSERT INTO exercise_translations (exercise_id, language, name) VALUES (?1, ?2, ?3)
         ON CONFLICT (exercise_id, language) DO UPDATE SET name = excluded.name",
        params![
            translation.exercise_id.to_string(),
            translation.language,
            translation.name,
        ],
    )?;
    Ok(())
}

fn exercise_name_taken(
    conn: &Connection,
    normalized: &str,
    exclude: Option<ExerciseID>,
) -> Result<bool, TxError> {
    let taken = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM exercises WHERE normalized_name = ?1 AND id <> ?2)",
        params![
            normalized,
            exclude.map(|id| id.to_string()).unwrap_or_default(),
        ],
        |row| row.get(0),
    )?;
    Ok(taken)
}

fn read_exercise_translations(
    conn: &Connection,
    exercise_id: ExerciseID,
) -> Result<Vec<ExerciseTranslation>, TxError> {
    let mut statement = conn.prepare(
        "SELECT language, name FROM exercise_translations WHERE exercise_id = ?1 ORDER BY language",
    )?;
    let rows = statement
        .query_map(params![exercise_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .map(|(language, name)| ExerciseTranslation {
            exercise_id,
            language,
            name,
        })
        .collect())
}

impl ExerciseRepository for SqliteStore {
    async fn seed_exercises(
        &self,
        exercises: Vec<(Exercise, Vec<ExerciseTranslation>)>,
    ) -> Result<bool, CreateError> {
        Ok(self.write(|tx| {
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM exercises", [], |row| row.get(0))?;
            if count > 0 {
                return Ok(false);
            }
            info!("seeding exercise catalog ({} entries)", exercises.len());
            for (exercise, translations) in &exercises {
                insert_exercise(tx, exercise)?;
                for translation in translations {
                    insert_translation(tx, translation)?;
                }
            }
            Ok(true)
        })?)
    }

    async fn read_exercises(
        &self,
        filter: &ExerciseFilter,
    ) -> Result<Vec<ExerciseWithTranslations>, ReadError> {
        let query = filter.normalized_query();
        Ok(self.read(|conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT {EXERCISE_COLUMNS} FROM exercises ORDER BY base_name COLLATE NOCASE"
            ))?;
            let rows = statement
                .query_map([], exercise_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut result = Vec::new();
            for parts in rows {
                let exercise = exercise_from_parts(parts)?;
                if let Some(query) = &query
                    && !exercise.normalized_name().contains(query.as_str())
                {
                    continue;
                }
                if let Some(muscle) = &filter.muscle
                    && !exercise.muscles.contains(muscle)
                {
                    continue;
                }
                if let Some(equipment) = &filter.equipment
                    && !exercise.equipment.contains(equipment)
                {
                    continue;
                }
                let translations = read_exercise_translations(conn, exercise.id)?;
                result.push(ExerciseWithTranslations {
                    exercise,
                    translations,
                });
            }
            Ok(result)
        })?)
    }

    async fn read_exercise(&self, id: ExerciseID) -> Result<ExerciseWithTranslations, ReadError> {
        Ok(self.read(|conn| {
            let parts = conn
                .query_row(
                    &format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1"),
                    params![id.to_string()],
                    exercise_from_row,
                )
                .optional()?
                .ok_or(TxError::NotFound)?;
            let exercise = exercise_from_parts(parts)?;
            let translations = read_exercise_translations(conn, id)?;
            Ok(ExerciseWithTranslations {
                exercise,
                translations,
            })
        })?)
    }

    async fn create_exercise(
        &self,
        exercise: Exercise,
        translation: ExerciseTranslation,
    ) -> Result<Exercise, CreateError> {
        Ok(self.write(|tx| {
            if exercise_name_taken(tx, &exercise.normalized_name(), None)? {
                return Err(TxError::Duplicate);
            }
            insert_exercise(tx, &exercise)?;
            insert_translation(tx, &translation)?;
            Ok(exercise)
        })?)
    }

    async fn update_exercise(
        &self,
        id: ExerciseID,
        name: Name,
        muscles: Vec<String>,
        equipment: Vec<String>,
        metric: MetricType,
    ) -> Result<Exercise, UpdateError> {
        Ok(self.write(|tx| {
            let parts = tx
                .query_row(
                    &format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1"),
                    params![id.to_string()],
                    exercise_from_row,
                )
                .optional()?
                .ok_or(TxError::NotFound)?;
            let existing = exercise_from_parts(parts)?;

            if exercise_name_taken(tx, &name.normalized(), Some(id))? {
                return Err(TxError::Duplicate);
            }

            tx.execute(
                "UPDATE exercises
                 SET base_name = ?2, normalized_name = ?3, muscles = ?4, equipment = ?5,
                     metric_type = ?6
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    name.as_ref(),
                    name.normalized(),
                    serde_json::to_string(&muscles)?,
                    serde_json::to_string(&equipment)?,
                    metric.to_string(),
                ],
            )?;
            insert_translation(
                tx,
                &ExerciseTranslation {
                    exercise_id: id,
                    language: "es".to_string(),
                    name: name.as_ref().to_string(),
                },
            )?;

            Ok(Exercise {
                name,
                muscles,
                equipment,
                metric,
                ..existing
            })
        })?)
    }

    async fn toggle_favorite(&self, id: ExerciseID) -> Result<bool, UpdateError> {
        Ok(self.write(|tx| {
            let removed = tx.execute(
                "DELETE FROM exercise_favorites WHERE exercise_id = ?1",
                params![id.to_string()],
            )?;
            if removed > 0 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO exercise_favorites (exercise_id, created_at) VALUES (?1, ?2)",
                params![id.to_string(), encode_ts(Utc::now())],
            )?;
            Ok(true)
        })?)
    }

    async fn record_recent(&self, id: ExerciseID) -> Result<(), UpdateError> {
        Ok(self.write(|tx| {
            tx.execute(
                "INSERT INTO exercise_recents (exercise_id, last_used_at) VALUES (?1, ?2)
                 ON CONFLICT (exercise_id) DO UPDATE SET last_used_at = excluded.last_used_at",
                params![id.to_string(), encode_ts(Utc::now())],
            )?;
            Ok(())
        })?)
    }

    async fn read_favorites(&self) -> Result<Vec<Favorite>, ReadError> {
        Ok(self.read(|conn| {
            let mut statement = conn.prepare(
                "SELECT exercise_id, created_at FROM exercise_favorites ORDER BY created_at DESC",
            )?;
            let rows = statement
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(id, created_at)| {
                    Ok(Favorite {
                        exercise_id: decode_uuid(&id)?.into(),
                        created_at: decode_ts(&created_at)?,
                    })
                })
                .collect()
        })?)
    }

    async fn read_recents(&self) -> Result<Vec<Recent>, ReadError> {
        Ok(self.read(|conn| {
            let mut statement = conn.prepare(
                "SELECT exercise_id, last_used_at FROM exercise_recents ORDER BY last_used_at DESC",
            )?;
            let rows = statement
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(id, last_used_at)| {
                    Ok(Recent {
                        exercise_id: decode_uuid(&id)?.into(),
                        last_used_at: decode_ts(&last_used_at)?,
                    })
                })
                .collect()
        })?)
    }
}

fn routine_from_row(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String, String, u32)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn routine_from_parts(parts: (String, String, String, String, u32)) -> Result<Routine, TxError> {
    let (id, name, created_at, updated_at, position) = parts;
    Ok(Routine {
        id: decode_uuid(&id)?.into(),
        name: decode_name(&name)?,
        created_at: decode_ts(&created_at)?,
        updated_at: decode_ts(&updated_at)?,
        position,
    })
}

const ROUTINE_COLUMNS: &str = "id, name, created_at, updated_at, position";

fn read_routine(conn: &Connection, id: RoutineID) -> Result<Routine, TxError> {
    let parts = conn
        .query_row(
            &format!("SELECT {ROUTINE_COLUMNS} FROM routines WHERE id = ?1"),
            params![id.to_string()],
            routine_from_row,
        )
        .optional()?
        .ok_or(TxError::NotFound)?;
    routine_from_parts(parts)
}

fn read_routine_tags(conn: &Connection, id: RoutineID) -> Result<Vec<String>, TxError> {
    let mut statement =
        conn.prepare("SELECT tag FROM routine_tags WHERE routine_id = ?1 ORDER BY rowid")?;
    let tags = statement
        .query_map(params![id.to_string()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

fn read_routine_memberships(
    conn: &Connection,
    id: RoutineID,
) -> Result<Vec<RoutineExercise>, TxError> {
    let mut statement = conn.prepare(
        "SELECT exercise_id, position FROM routine_exercises
         WHERE routine_id = ?1 ORDER BY position",
    )?;
    let rows = statement
        .query_map(params![id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(exercise_id, position)| {
            Ok(RoutineExercise {
                routine_id: id,
                exercise_id: decode_uuid(&exercise_id)?.into(),
                position,
            })
        })
        .collect()
}

fn read_routine_defaults(
    conn: &Connection,
    id: RoutineID,
) -> Result<BTreeMap<ExerciseID, ExerciseDefaults>, TxError> {
    let mut statement = conn.prepare(
        "SELECT exercise_id, defaults FROM routine_exercise_defaults WHERE routine_id = ?1",
    )?;
    let rows = statement
        .query_map(params![id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(exercise_id, defaults)| {
            Ok((
                decode_uuid(&exercise_id)?.into(),
                serde_json::from_str(&defaults)?,
            ))
        })
        .collect()
}

fn replace_routine_tags(conn: &Connection, id: RoutineID, tags: &[String]) -> Result<(), TxError> {
    conn.execute(
        "DELETE FROM routine_tags WHERE routine_id = ?1",
        params![id.to_string()],
    )?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO routine_tags (routine_id, tag) VALUES (?1, ?2)",
            params![id.to_string(), tag],
        )?;
    }
    Ok(())
}

fn write_routine_defaults(
    conn: &Connection,
    routine_id: RoutineID,
    exercise_id: ExerciseID,
    defaults: &ExerciseDefaults,
) -> Result<(), TxError> {
    conn.execute(
        "INSERT INTO routine_exercise_defaults (routine_id, exercise_id, defaults)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (routine_id, exercise_id) DO UPDATE SET defaults = excluded.defaults",
        params![
            routine_id.to_string(),
            exercise_id.to_string(),
            serde_json::to_string(defaults)?,
        ],
    )?;
    Ok(())
}

/// Appends a version log entry capturing the routine's current state.
fn write_snapshot(conn: &Connection, id: RoutineID) -> Result<(), TxError> {
    let routine = read_routine(conn, id)?;
    let tags = read_routine_tags(conn, id)?;
    let memberships = read_routine_memberships(conn, id)?;
    let defaults = read_routine_defaults(conn, id)?;
    let snapshot = RoutineSnapshot::new(&routine.name, &tags, &memberships, &defaults);
    conn.execute(
        "INSERT INTO routine_versions (id, routine_id, created_at, name, snapshot)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            RoutineVersionID::new().to_string(),
            id.to_string(),
            encode_ts(Utc::now()),
            routine.name.as_ref(),
            serde_json::to_string(&snapshot)?,
        ],
    )?;
    Ok(())
}

fn touch_routine(conn: &Connection, id: RoutineID, at: DateTime<Utc>) -> Result<(), TxError> {
    conn.execute(
        "UPDATE routines SET updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), encode_ts(at)],
    )?;
    Ok(())
}

fn next_routine_position(conn: &Connection) -> Result<u32, TxError> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM routines", [], |row| row.get(0))?;
    Ok(count)
}

/// Re-packs all routine positions into a dense 0..N-1 sequence.
fn compact_routine_positions(conn: &Connection) -> Result<(), TxError> {
    conn.execute(
        "UPDATE routines SET position = (
             SELECT COUNT(*) FROM routines r2 WHERE r2.position < routines.position
         )",
        [],
    )?;
    Ok(())
}

/// Re-packs one routine's exercise positions into a dense 0..M-1 sequence.
fn compact_exercise_positions(conn: &Connection, id: RoutineID) -> Result<(), TxError> {
    conn.execute(
        "UPDATE routine_exercises SET position = (
             SELECT COUNT(*) FROM routine_exercises r2
             WHERE r2.routine_id = routine_exercises.routine_id
               AND r2.position < routine_exercises.position
         )
         WHERE routine_id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

fn insert_routine(conn: &Connection, routine: &Routine) -> Result<(), TxError> {
    conn.execute(
        "INSERT INTO routines (id, name, created_at, updated_at, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            routine.id.to_string(),
            routine.name.as_ref(),
            encode_ts(routine.created_at),
            encode_ts(routine.updated_at),
            routine.position,
        ],
    )?;
    Ok(())
}

fn insert_membership(
    conn: &Connection,
    routine_id: RoutineID,
    exercise_id: ExerciseID,
    position: u32,
) -> Result<(), TxError> {
    conn.execute(
        "INSERT INTO routine_exercises (routine_id, exercise_id, position) VALUES (?1, ?2, ?3)",
        params![routine_id.to_string(), exercise_id.to_string(), position],
    )?;
    Ok(())
}

impl RoutineRepository for SqliteStore {
    async fn read_routines(&self) -> Result<Vec<Routine>, ReadError> {
        Ok(self.read(|conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT {ROUTINE_COLUMNS} FROM routines ORDER BY position"
            ))?;
            let rows = statement
                .query_map([], routine_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(routine_from_parts).collect()
        })?)
    }

    async fn create_routine(&self, name: Name, tags: Vec<String>) -> Result<Routine, CreateError> {
        Ok(self.write(|tx| {
            let now = Utc::now();
            let routine = Routine {
                id: RoutineID::new(),
                name,
                created_at: now,
                updated_at: now,
                position: next_routine_position(tx)?,
            };
            insert_routine(tx, &routine)?;
            replace_routine_tags(tx, routine.id, &tags)?;
            write_snapshot(tx, routine.id)?;
            Ok(routine)
        })?)
    }

    async fn update_routine(
        &self,
        id: RoutineID,
        name: Name,
        tags: Vec<String>,
    ) -> Result<Routine, UpdateError> {
        Ok(self.write(|tx| {
            let existing = read_routine(tx, id)?;
            let now = Utc::now();
            tx.execute(
                "UPDATE routines SET name = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), name.as_ref(), encode_ts(now)],
            )?;
            replace_routine_tags(tx, id, &tags)?;
            write_snapshot(tx, id)?;
            Ok(Routine {
                name,
                updated_at: now,
                ..existing
            })
        })?)
    }

    async fn delete_routine(&self, id: RoutineID) -> Result<RoutineID, DeleteError> {
        Ok(self.write(|tx| {
            for table in [
                "routine_tags",
                "routine_exercises",
                "routine_exercise_defaults",
                "routine_versions",
            ] {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE routine_id = ?1"),
                    params![id.to_string()],
                )?;
            }
            tx.execute(
                "DELETE FROM routines WHERE id = ?1",
                params![id.to_string()],
            )?;
            compact_routine_positions(tx)?;
            Ok(id)
        })?)
    }

    async fn duplicate_routine(&self, id: RoutineID) -> Result<Routine, CreateError> {
        Ok(self.write(|tx| {
            let source = read_routine(tx, id)?;
            let tags = read_routine_tags(tx, id)?;
            let memberships = read_routine_memberships(tx, id)?;
            let defaults = read_routine_defaults(tx, id)?;

            let name = Name::new(&format!("{} (Copia)", source.name))
                .map_err(|err| TxError::Corrupt(err.to_string()))?;
            let now = Utc::now();
            let copy = Routine {
                id: RoutineID::new(),
                name,
                created_at: now,
                updated_at: now,
                position: next_routine_position(tx)?,
            };
            insert_routine(tx, &copy)?;
            replace_routine_tags(tx, copy.id, &tags)?;
            for membership in &memberships {
                insert_membership(tx, copy.id, membership.exercise_id, membership.position)?;
            }
            for (exercise_id, default) in &defaults {
                write_routine_defaults(tx, copy.id, *exercise_id, default)?;
            }
            write_snapshot(tx, copy.id)?;
            Ok(copy)
        })?)
    }

    async fn reorder_routine(
        &self,
        id: RoutineID,
        direction: Direction,
    ) -> Result<(), UpdateError> {
        Ok(self.write(|tx| {
            let mut statement = tx.prepare(
                "SELECT id, position FROM routines ORDER BY position",
            )?;
            let rows = statement
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            drop(statement);

            let index = rows
                .iter()
                .position(|(row_id, _)| *row_id == id.to_string())
                .ok_or(TxError::NotFound)?;
            let neighbor = match direction {
                Direction::Up => index.checked_sub(1),
                Direction::Down => (index + 1 < rows.len()).then_some(index + 1),
            };
            // No-op at either boundary.
            let Some(neighbor) = neighbor else {
                return Ok(());
            };

            tx.execute(
                "UPDATE routines SET position = ?2 WHERE id = ?1",
                params![rows[index].0, rows[neighbor].1],
            )?;
            tx.execute(
                "UPDATE routines SET position = ?2 WHERE id = ?1",
                params![rows[neighbor].0, rows[index].1],
            )?;
            Ok(())
        })?)
    }

    async fn add_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError> {
        Ok(self.write(|tx| {
            read_routine(tx, routine_id)?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM routine_exercises
                 WHERE routine_id = ?1 AND exercise_id = ?2)",
                params![routine_id.to_string(), exercise_id.to_string()],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(());
            }
            let position: u32 = tx.query_row(
                "SELECT COUNT(*) FROM routine_exercises WHERE routine_id = ?1",
                params![routine_id.to_string()],
                |row| row.get(0),
            )?;
            insert_membership(tx, routine_id, exercise_id, position)?;
            touch_routine(tx, routine_id, Utc::now())?;
            write_snapshot(tx, routine_id)?;
            Ok(())
        })?)
    }

    async fn remove_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError> {
        Ok(self.write(|tx| {
            let removed = tx.execute(
                "DELETE FROM routine_exercises WHERE routine_id = ?1 AND exercise_id = ?2",
                params![routine_id.to_string(), exercise_id.to_string()],
            )?;
            if removed == 0 {
                return Ok(());
            }
            tx.execute(
                "DELETE FROM routine_exercise_defaults WHERE routine_id = ?1 AND exercise_id = ?2",
                params![routine_id.to_string(), exercise_id.to_string()],
            )?;
            compact_exercise_positions(tx, routine_id)?;
            touch_routine(tx, routine_id, Utc::now())?;
            write_snapshot(tx, routine_id)?;
            Ok(())
        })?)
    }

    async fn reorder_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        direction: Direction,
    ) -> Result<(), UpdateError> {
        Ok(self.write(|tx| {
            let memberships = read_routine_memberships(tx, routine_id)?;
            let index = memberships
                .iter()
                .position(|m| m.exercise_id == exercise_id)
                .ok_or(TxError::NotFound)?;
            let neighbor = match direction {
                Direction::Up => index.checked_sub(1),
                Direction::Down => (index + 1 < memberships.len()).then_some(index + 1),
            };
            let Some(neighbor) = neighbor else {
                return Ok(());
            };

            for (membership, position) in [
                (&memberships[index], memberships[neighbor].position),
                (&memberships[neighbor], memberships[index].position),
            ] {
                tx.execute(
                    "UPDATE routine_exercises SET position = ?3
                     WHERE routine_id = ?1 AND exercise_id = ?2",
                    params![
                        routine_id.to_string(),
                        membership.exercise_id.to_string(),
                        position,
                    ],
                )?;
            }
            touch_routine(tx, routine_id, Utc::now())?;
            write_snapshot(tx, routine_id)?;
            Ok(())
        })?)
    }

    async fn set_exercise_defaults(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        defaults: ExerciseDefaults,
    ) -> Result<(), UpdateError> {
        Ok(self.write(|tx| {
            read_routine(tx, routine_id)?;
            write_routine_defaults(tx, routine_id, exercise_id, &defaults)?;
            touch_routine(tx, routine_id, Utc::now())?;
            write_snapshot(tx, routine_id)?;
            Ok(())
        })?)
    }

    async fn read_routine_detail(&self, id: RoutineID) -> Result<RoutineDetail, ReadError> {
        Ok(self.read(|conn| {
            let routine = read_routine(conn, id)?;
            let tags = read_routine_tags(conn, id)?;
            let exercises = read_routine_memberships(conn, id)?;
            let defaults = read_routine_defaults(conn, id)?;
            Ok(RoutineDetail {
                routine,
                tags,
                exercises,
                defaults,
            })
        })?)
    }

    async fn read_routine_versions(
        &self,
        id: RoutineID,
    ) -> Result<Vec<RoutineVersion>, ReadError> {
        Ok(self.read(|conn| {
            let mut statement = conn.prepare(
                "SELECT id, created_at, name, snapshot FROM routine_versions
                 WHERE routine_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = statement
                .query_map(params![id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(version_id, created_at, name, snapshot)| {
                    Ok(RoutineVersion {
                        id: decode_uuid(&version_id)?.into(),
                        routine_id: id,
                        created_at: decode_ts(&created_at)?,
                        name,
                        snapshot,
                    })
                })
                .collect()
        })?)
    }

    async fn replace_routine_exercises(
        &self,
        id: RoutineID,
        entries: Vec<(ExerciseID, ExerciseDefaults)>,
    ) -> Result<(), UpdateError> {
        Ok(self.write(|tx| {
            read_routine(tx, id)?;
            tx.execute(
                "DELETE FROM routine_exercises WHERE routine_id = ?1",
                params![id.to_string()],
            )?;
            tx.execute(
                "DELETE FROM routine_exercise_defaults WHERE routine_id = ?1",
                params![id.to_string()],
            )?;
            for (position, (exercise_id, defaults)) in entries.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                insert_membership(tx, id, *exercise_id, position as u32)?;
                if !defaults.is_empty() {
                    write_routine_defaults(tx, id, *exercise_id, defaults)?;
                }
            }
            touch_routine(tx, id, Utc::now())?;
            write_snapshot(tx, id)?;
            Ok(())
        })?)
    }

    async fn import_routine(&self, plan: ImportPlan) -> Result<Routine, CreateError> {
        Ok(self.write(|tx| {
            // Bundled custom exercises are inserted without the duplicate
            // name check: importing an exported routine back onto the same
            // device must still succeed.
            for (exercise, translations) in &plan.new_exercises {
                insert_exercise(tx, exercise)?;
                for translation in translations {
                    insert_translation(tx, translation)?;
                }
            }

            let now = Utc::now();
            let routine = Routine {
                id: plan.routine_id,
                name: plan.name,
                created_at: now,
                updated_at: now,
                position: next_routine_position(tx)?,
            };
            insert_routine(tx, &routine)?;
            replace_routine_tags(tx, routine.id, &plan.tags)?;
            for (position, (exercise_id, defaults)) in plan.entries.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                insert_membership(tx, routine.id, *exercise_id, position as u32)?;
                if !defaults.is_empty() {
                    write_routine_defaults(tx, routine.id, *exercise_id, defaults)?;
                }
            }
            write_snapshot(tx, routine.id)?;
            Ok(routine)
        })?)
    }
}

fn workout_from_row(
    row: &rusqlite::Row,
) -> rusqlite::Result<(String, Option<String>, Option<String>, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn workout_from_parts(
    parts: (String, Option<String>, Option<String>, String, String, String),
) -> Result<Workout, TxError> {
    let (id, routine_id, routine_name, tags, started_at, ended_at) = parts;
    Ok(Workout {
        id: decode_uuid(&id)?.into(),
        routine_id: routine_id
            .as_deref()
            .map(|value| decode_uuid(value).map(RoutineID::from))
            .transpose()?,
        routine_name,
        tags: serde_json::from_str(&tags)?,
        started_at: decode_ts(&started_at)?,
        ended_at: decode_ts(&ended_at)?,
    })
}

const WORKOUT_COLUMNS: &str = "id, routine_id, routine_name, tags, started_at, ended_at";

fn read_sets(
    conn: &Connection,
    workout_exercise_id: WorkoutExerciseID,
) -> Result<Vec<WorkoutSet>, TxError> {
    let mut statement = conn.prepare(
        "SELECT position, weight, reps, duration, distance, rpe, completed FROM workout_sets
         WHERE workout_exercise_id = ?1 ORDER BY position",
    )?;
    let rows = statement
        .query_map(params![workout_exercise_id.to_string()], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<u32>>(2)?,
                row.get::<_, Option<u32>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<u8>>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(position, weight, reps, duration, distance, rpe, completed)| {
            Ok(WorkoutSet {
                position,
                weight,
                reps,
                duration,
                distance,
                rpe: rpe
                    .map(|value| Rpe::new(value).map_err(|err| TxError::Corrupt(err.to_string())))
                    .transpose()?,
                completed,
            })
        })
        .collect()
}

impl WorkoutRepository for SqliteStore {
    async fn create_workout(&self, workout: NewWorkout) -> Result<Workout, CreateError> {
        Ok(self.write(|tx| {
            let id = WorkoutID::new();
            tx.execute(
                &format!("INSERT INTO workouts ({WORKOUT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    id.to_string(),
                    workout.routine_id.map(|r| r.to_string()),
                    workout.routine_name,
                    serde_json::to_string(&workout.tags)?,
                    encode_ts(workout.started_at),
                    encode_ts(workout.ended_at),
                ],
            )?;
            for (position, exercise) in workout.exercises.iter().enumerate() {
                let exercise_row_id = WorkoutExerciseID::new();
                #[allow(clippy::cast_possible_truncation)]
                tx.execute(
                    "INSERT INTO workout_exercises (id, workout_id, exercise_id, name, position)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        exercise_row_id.to_string(),
                        id.to_string(),
                        exercise.exercise_id.to_string(),
                        exercise.name,
                        position as u32,
                    ],
                )?;
                for set in &exercise.sets {
                    tx.execute(
                        "INSERT INTO workout_sets
                         (workout_exercise_id, position, weight, reps, duration, distance, rpe, completed)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            exercise_row_id.to_string(),
                            set.position,
                            set.weight,
                            set.reps,
                            set.duration,
                            set.distance,
                            set.rpe.map(Rpe::get),
                            set.completed,
                        ],
                    )?;
                }
            }
            Ok(Workout {
                id,
                routine_id: workout.routine_id,
                routine_name: workout.routine_name.clone(),
                tags: workout.tags.clone(),
                started_at: workout.started_at,
                ended_at: workout.ended_at,
            })
        })?)
    }

    async fn read_workouts_since(&self, since: DateTime<Utc>) -> Result<Vec<Workout>, ReadError> {
        Ok(self.read(|conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE ended_at >= ?1 ORDER BY ended_at DESC"
            ))?;
            let rows = statement
                .query_map(params![encode_ts(since)], workout_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(workout_from_parts).collect()
        })?)
    }

    async fn read_last_workout_for_routine(
        &self,
        routine_id: RoutineID,
    ) -> Result<Option<Workout>, ReadError> {
        Ok(self.read(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {WORKOUT_COLUMNS} FROM workouts
                     WHERE routine_id = ?1 ORDER BY ended_at DESC LIMIT 1"
                ),
                params![routine_id.to_string()],
                workout_from_row,
            )
            .optional()?
            .map(workout_from_parts)
            .transpose()
        })?)
    }

    async fn read_workout_exercises(
        &self,
        workout_id: WorkoutID,
    ) -> Result<Vec<WorkoutExercise>, ReadError> {
        Ok(self.read(|conn| {
            let mut statement = conn.prepare(
                "SELECT id, exercise_id, name, position FROM workout_exercises
                 WHERE workout_id = ?1 ORDER BY position",
            )?;
            let rows = statement
                .query_map(params![workout_id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(id, exercise_id, name, position)| {
                    Ok(WorkoutExercise {
                        id: decode_uuid(&id)?.into(),
                        workout_id,
                        exercise_id: decode_uuid(&exercise_id)?.into(),
                        name,
                        position,
                    })
                })
                .collect()
        })?)
    }

    async fn read_workout_sets(
        &self,
        workout_exercise_id: WorkoutExerciseID,
    ) -> Result<Vec<WorkoutSet>, ReadError> {
        Ok(self.read(|conn| read_sets(conn, workout_exercise_id))?)
    }

    async fn read_latest_sets(
        &self,
        exercise_id: ExerciseID,
    ) -> Result<Vec<WorkoutSet>, ReadError> {
        Ok(self.read(|conn| {
            let latest: Option<String> = conn
                .query_row(
                    "SELECT we.id FROM workout_exercises we
                     JOIN workouts w ON w.id = we.workout_id
                     WHERE we.exercise_id = ?1
                     ORDER BY w.ended_at DESC LIMIT 1",
                    params![exercise_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            match latest {
                Some(id) => read_sets(conn, decode_uuid(&id)?.into()),
                None => Ok(vec![]),
            }
        })?)
    }

    async fn delete_workout(&self, id: WorkoutID) -> Result<WorkoutID, DeleteError> {
        Ok(self.write(|tx| {
            tx.execute(
                "DELETE FROM workout_sets WHERE workout_exercise_id IN
                 (SELECT id FROM workout_exercises WHERE workout_id = ?1)",
                params![id.to_string()],
            )?;
            tx.execute(
                "DELETE FROM workout_exercises WHERE workout_id = ?1",
                params![id.to_string()],
            )?;
            tx.execute(
                "DELETE FROM workouts WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(id)
        })?)
    }
}

fn settings_from_row(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String, u32)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn settings_from_parts(parts: (String, String, String, u32)) -> Result<Settings, TxError> {
    let (theme, language, units, stats_range_days) = parts;
    Ok(Settings {
        theme: theme
            .parse()
            .map_err(|_| TxError::Corrupt(format!("theme {theme:?}")))?,
        language: language
            .parse()
            .map_err(|_| TxError::Corrupt(format!("language {language:?}")))?,
        units: units
            .parse()
            .map_err(|_| TxError::Corrupt(format!("units {units:?}")))?,
        stats_range_days,
    })
}

fn upsert_settings(conn: &Connection, settings: &Settings) -> Result<(), TxError> {
    conn.execute(
        "INSERT INTO settings (id, theme, language, units, stats_range_days)
         VALUES (1, ?1, ?2, ?3, ?4)
         ON CONFLICT (id) DO UPDATE SET
             theme = excluded.theme,
             language = excluded.language,
             units = excluded.units,
             stats_range_days = excluded.stats_range_days",
        params![
            settings.theme.to_string(),
            settings.language.to_string(),
            settings.units.to_string(),
            settings.stats_range_days,
        ],
    )?;
    Ok(())
}

impl SettingsRepository for SqliteStore {
    async fn read_settings(&self) -> Result<Settings, ReadError> {
        Ok(self.write(|tx| {
            let row = tx
                .query_row(
                    "SELECT theme, language, units, stats_range_days FROM settings WHERE id = 1",
                    [],
                    settings_from_row,
                )
                .optional()?;
            match row {
                Some(parts) => settings_from_parts(parts),
                None => {
                    // First read persists the defaults.
                    let settings = Settings::default();
                    upsert_settings(tx, &settings)?;
                    Ok(settings)
                }
            }
        })?)
    }

    async fn write_settings(&self, settings: Settings) -> Result<Settings, UpdateError> {
        Ok(self.write(|tx| {
            upsert_settings(tx, &settings)?;
            Ok(settings)
        })?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use entreno_domain::{NewWorkoutExercise, Theme, catalog};
    use pretty_assertions::assert_eq;

    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn custom_exercise(name: &str) -> (Exercise, ExerciseTranslation) {
        let exercise = Exercise {
            id: ExerciseID::new(),
            name: Name::new(name).unwrap(),
            muscles: vec!["Pectoralis major".to_string()],
            equipment: vec!["Barbell".to_string()],
            metric: MetricType::WeightReps,
            custom: true,
            source: ExerciseSource::Custom,
            created_at: Utc::now(),
        };
        let translation = ExerciseTranslation {
            exercise_id: exercise.id,
            language: "es".to_string(),
            name: name.to_string(),
        };
        (exercise, translation)
    }

    async fn create_routines(store: &SqliteStore, names: &[&str]) -> Vec<Routine> {
        let mut routines = Vec::new();
        for name in names {
            routines.push(
                store
                    .create_routine(Name::new(name).unwrap(), vec![])
                    .await
                    .unwrap(),
            );
        }
        routines
    }

    async fn routine_positions(store: &SqliteStore) -> Vec<(String, u32)> {
        store
            .read_routines()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.name.as_ref().to_string(), r.position))
            .collect()
    }

    #[tokio::test]
    async fn test_seed_exercises_only_once() {
        let store = store();

        let seeded = store
            .seed_exercises(catalog::seed_records(Utc::now()))
            .await
            .unwrap();
        assert!(seeded);

        let seeded_again = store
            .seed_exercises(catalog::seed_records(Utc::now()))
            .await
            .unwrap();
        assert!(!seeded_again);

        let exercises = store
            .read_exercises(&ExerciseFilter::default())
            .await
            .unwrap();
        assert_eq!(exercises.len(), catalog::EXERCISES.len());
    }

    #[tokio::test]
    async fn test_create_exercise_rejects_diacritic_duplicate() {
        let store = store();
        let (exercise, translation) = custom_exercise("Press Militár");
        store.create_exercise(exercise, translation).await.unwrap();

        let (duplicate, translation) = custom_exercise("press militar");
        assert!(matches!(
            store.create_exercise(duplicate, translation).await,
            Err(CreateError::DuplicateName)
        ));
    }

    #[tokio::test]
    async fn test_update_exercise_excludes_own_name_from_duplicate_check() {
        let store = store();
        let (exercise, translation) = custom_exercise("Curl Francés");
        let created = store.create_exercise(exercise, translation).await.unwrap();

        // Renaming to a variant of its own name is allowed.
        let updated = store
            .update_exercise(
                created.id,
                Name::new("Curl Frances").unwrap(),
                vec!["Triceps brachii".to_string()],
                vec![],
                MetricType::WeightReps,
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_ref(), "Curl Frances");

        let (other, translation) = custom_exercise("Remo");
        let other = store.create_exercise(other, translation).await.unwrap();
        assert!(matches!(
            store
                .update_exercise(
                    other.id,
                    Name::new("curl francés").unwrap(),
                    vec![],
                    vec![],
                    MetricType::WeightReps,
                )
                .await,
            Err(UpdateError::DuplicateName)
        ));
    }

    #[tokio::test]
    async fn test_exercise_filters() {
        let store = store();
        store
            .seed_exercises(catalog::seed_records(Utc::now()))
            .await
            .unwrap();

        let by_query = store
            .read_exercises(&ExerciseFilter {
                query: Some("press".to_string()),
                ..ExerciseFilter::default()
            })
            .await
            .unwrap();
        assert!(!by_query.is_empty());
        assert!(
            by_query
                .iter()
                .all(|e| e.exercise.normalized_name().contains("press"))
        );

        let by_muscle = store
            .read_exercises(&ExerciseFilter {
                muscle: Some("Gastrocnemius".to_string()),
                ..ExerciseFilter::default()
            })
            .await
            .unwrap();
        assert!(!by_muscle.is_empty());
        assert!(
            by_muscle
                .iter()
                .all(|e| e.exercise.muscles.iter().any(|m| m == "Gastrocnemius"))
        );
    }

    #[tokio::test]
    async fn test_toggle_favorite_and_record_recent() {
        let store = store();
        let (exercise, translation) = custom_exercise("Press de Banca");
        let exercise = store.create_exercise(exercise, translation).await.unwrap();

        assert!(store.toggle_favorite(exercise.id).await.unwrap());
        assert_eq!(store.read_favorites().await.unwrap().len(), 1);
        assert!(!store.toggle_favorite(exercise.id).await.unwrap());
        assert!(store.read_favorites().await.unwrap().is_empty());

        store.record_recent(exercise.id).await.unwrap();
        store.record_recent(exercise.id).await.unwrap();
        assert_eq!(store.read_recents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_routine_positions_stay_dense() {
        let store = store();
        let routines = create_routines(&store, &["A", "B", "C", "D"]).await;

        assert_eq!(
            routine_positions(&store).await,
            vec![
                ("A".to_string(), 0),
                ("B".to_string(), 1),
                ("C".to_string(), 2),
                ("D".to_string(), 3),
            ]
        );

        store.delete_routine(routines[1].id).await.unwrap();
        assert_eq!(
            routine_positions(&store).await,
            vec![
                ("A".to_string(), 0),
                ("C".to_string(), 1),
                ("D".to_string(), 2),
            ]
        );

        store
            .reorder_routine(routines[3].id, Direction::Up)
            .await
            .unwrap();
        assert_eq!(
            routine_positions(&store).await,
            vec![
                ("A".to_string(), 0),
                ("D".to_string(), 1),
                ("C".to_string(), 2),
            ]
        );

        // Boundary moves are no-ops.
        store
            .reorder_routine(routines[0].id, Direction::Up)
            .await
            .unwrap();
        assert_eq!(routine_positions(&store).await[0], ("A".to_string(), 0));
    }

    #[tokio::test]
    async fn test_routine_exercise_positions_stay_dense() {
        let store = store();
        let routine = create_routines(&store, &["Empuje"]).await.remove(0);
        let mut ids = Vec::new();
        for name in ["E1", "E2", "E3"] {
            let (exercise, translation) = custom_exercise(name);
            ids.push(
                store
                    .create_exercise(exercise, translation)
                    .await
                    .unwrap()
                    .id,
            );
        }
        for id in &ids {
            store.add_routine_exercise(routine.id, *id).await.unwrap();
        }
        // Adding an existing pair is a no-op.
        store.add_routine_exercise(routine.id, ids[0]).await.unwrap();

        let detail = store.read_routine_detail(routine.id).await.unwrap();
        assert_eq!(
            detail.exercises.iter().map(|e| e.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        store
            .remove_routine_exercise(routine.id, ids[1])
            .await
            .unwrap();
        let detail = store.read_routine_detail(routine.id).await.unwrap();
        assert_eq!(
            detail
                .exercises
                .iter()
                .map(|e| (e.exercise_id, e.position))
                .collect::<Vec<_>>(),
            vec![(ids[0], 0), (ids[2], 1)]
        );

        store
            .reorder_routine_exercise(routine.id, ids[2], Direction::Up)
            .await
            .unwrap();
        let detail = store.read_routine_detail(routine.id).await.unwrap();
        assert_eq!(detail.exercises[0].exercise_id, ids[2]);
        assert_eq!(detail.exercises[1].exercise_id, ids[0]);
    }

    #[tokio::test]
    async fn test_delete_routine_leaves_no_residual_rows() {
        let store = store();
        let routine = store
            .create_routine(Name::new("Pierna").unwrap(), vec!["lunes".to_string()])
            .await
            .unwrap();
        let (exercise, translation) = custom_exercise("Sentadilla");
        let exercise = store.create_exercise(exercise, translation).await.unwrap();
        store
            .add_routine_exercise(routine.id, exercise.id)
            .await
            .unwrap();
        store
            .set_exercise_defaults(
                routine.id,
                exercise.id,
                ExerciseDefaults {
                    sets: Some(5),
                    ..ExerciseDefaults::default()
                },
            )
            .await
            .unwrap();

        store.delete_routine(routine.id).await.unwrap();

        let conn = store.conn.lock().unwrap();
        for table in [
            "routine_tags",
            "routine_exercises",
            "routine_exercise_defaults",
            "routine_versions",
        ] {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE routine_id = ?1"),
                    params![routine.id.to_string()],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 0, "{table} has residual rows");
        }
    }

    #[tokio::test]
    async fn test_duplicate_routine_copies_aggregate() {
        let store = store();
        let routine = store
            .create_routine(Name::new("Empuje").unwrap(), vec!["lunes".to_string()])
            .await
            .unwrap();
        let (exercise, translation) = custom_exercise("Press");
        let exercise = store.create_exercise(exercise, translation).await.unwrap();
        store
            .add_routine_exercise(routine.id, exercise.id)
            .await
            .unwrap();
        store
            .set_exercise_defaults(
                routine.id,
                exercise.id,
                ExerciseDefaults {
                    reps: Some(8),
                    ..ExerciseDefaults::default()
                },
            )
            .await
            .unwrap();

        let copy = store.duplicate_routine(routine.id).await.unwrap();

        assert_eq!(copy.name.as_ref(), "Empuje (Copia)");
        assert_ne!(copy.id, routine.id);
        assert_eq!(copy.position, 1);
        let detail = store.read_routine_detail(copy.id).await.unwrap();
        assert_eq!(detail.tags, vec!["lunes".to_string()]);
        assert_eq!(detail.exercises.len(), 1);
        assert_eq!(detail.defaults[&exercise.id].reps, Some(8));
    }

    #[tokio::test]
    async fn test_version_log_grows_with_mutations() {
        let store = store();
        let routine = store
            .create_routine(Name::new("Empuje").unwrap(), vec![])
            .await
            .unwrap();
        assert_eq!(
            store.read_routine_versions(routine.id).await.unwrap().len(),
            1
        );

        store
            .update_routine(
                routine.id,
                Name::new("Empuje Fuerte").unwrap(),
                vec!["lunes".to_string()],
            )
            .await
            .unwrap();
        let versions = store.read_routine_versions(routine.id).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].name, "Empuje Fuerte");

        let snapshot: entreno_domain::RoutineSnapshot =
            serde_json::from_str(&versions[0].snapshot).unwrap();
        assert_eq!(snapshot.tags, vec!["lunes".to_string()]);
    }

    fn completed_set(position: u32, weight: f64, reps: u32) -> WorkoutSet {
        WorkoutSet {
            position,
            weight: Some(weight),
            reps: Some(reps),
            completed: true,
            ..WorkoutSet::default()
        }
    }

    async fn save_workout(
        store: &SqliteStore,
        exercise_id: ExerciseID,
        ended_at: DateTime<Utc>,
        sets: Vec<WorkoutSet>,
    ) -> Workout {
        store
            .create_workout(NewWorkout {
                routine_id: None,
                routine_name: None,
                tags: vec![],
                started_at: ended_at - TimeDelta::minutes(45),
                ended_at,
                exercises: vec![NewWorkoutExercise {
                    exercise_id,
                    name: "Press de Banca".to_string(),
                    sets,
                }],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_workouts_since_newest_first() {
        let store = store();
        let exercise_id = ExerciseID::from(1);
        let base = Utc::now();

        save_workout(&store, exercise_id, base - TimeDelta::days(10), vec![]).await;
        save_workout(&store, exercise_id, base - TimeDelta::days(1), vec![]).await;
        save_workout(&store, exercise_id, base - TimeDelta::days(40), vec![]).await;

        let workouts = store
            .read_workouts_since(base - TimeDelta::days(30))
            .await
            .unwrap();
        assert_eq!(workouts.len(), 2);
        assert!(workouts[0].ended_at > workouts[1].ended_at);
    }

    #[tokio::test]
    async fn test_latest_sets_come_from_most_recent_workout() {
        let store = store();
        let exercise_id = ExerciseID::from(1);
        let base = Utc::now();

        save_workout(
            &store,
            exercise_id,
            base - TimeDelta::days(7),
            vec![completed_set(0, 60.0, 10)],
        )
        .await;
        save_workout(
            &store,
            exercise_id,
            base - TimeDelta::days(1),
            vec![completed_set(0, 65.0, 8), completed_set(1, 65.0, 6)],
        )
        .await;

        let sets = store.read_latest_sets(exercise_id).await.unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].weight, Some(65.0));

        assert!(
            store
                .read_latest_sets(ExerciseID::from(99))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_delete_workout_removes_children() {
        let store = store();
        let workout = save_workout(
            &store,
            ExerciseID::from(1),
            Utc::now(),
            vec![completed_set(0, 60.0, 10)],
        )
        .await;

        store.delete_workout(workout.id).await.unwrap();

        let conn = store.conn.lock().unwrap();
        let exercises: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM workout_exercises WHERE workout_id = ?1",
                params![workout.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        let sets: i64 = conn
            .query_row("SELECT COUNT(*) FROM workout_sets", [], |row| row.get(0))
            .unwrap();
        assert_eq!((exercises, sets), (0, 0));
    }

    #[tokio::test]
    async fn test_settings_first_read_persists_defaults() {
        let store = store();
        let settings = store.read_settings().await.unwrap();
        assert_eq!(settings, Settings::default());

        let updated = store
            .write_settings(Settings {
                theme: Theme::Light,
                stats_range_days: 90,
                ..Settings::default()
            })
            .await
            .unwrap();
        assert_eq!(store.read_settings().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_import_plan_materializes_routine_and_exercises() {
        let store = store();
        // The same custom exercise already exists locally; the import
        // still goes through under the fresh id.
        let (existing, translation) = custom_exercise("Press Landmine");
        store.create_exercise(existing, translation).await.unwrap();

        let (fresh, fresh_translation) = custom_exercise("Press Landmine");
        let plan = ImportPlan {
            routine_id: RoutineID::new(),
            name: Name::new("Importada").unwrap(),
            tags: vec!["martes".to_string()],
            new_exercises: vec![(fresh.clone(), vec![fresh_translation])],
            entries: vec![(
                fresh.id,
                ExerciseDefaults {
                    sets: Some(4),
                    ..ExerciseDefaults::default()
                },
            )],
            created_at: Utc::now(),
        };

        let routine = store.import_routine(plan).await.unwrap();

        let detail = store.read_routine_detail(routine.id).await.unwrap();
        assert_eq!(detail.routine.name.as_ref(), "Importada");
        assert_eq!(detail.tags, vec!["martes".to_string()]);
        assert_eq!(detail.exercises.len(), 1);
        assert_eq!(detail.exercises[0].exercise_id, fresh.id);
        assert_eq!(detail.defaults[&fresh.id].sets, Some(4));
        assert_eq!(
            store.read_routine_versions(routine.id).await.unwrap().len(),
            1
        );
        assert_eq!(
            store
                .read_exercise(fresh.id)
                .await
                .unwrap()
                .exercise
                .name
                .as_ref(),
            "Press Landmine"
        );
    }
}
