use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Exercise, ExerciseID, ExerciseSource, ExerciseTranslation, ExerciseWithTranslations,
    ImportError, MetricType, Name, ReadError, Routine, RoutineDetail, RoutineID,
    routine::ExerciseDefaults,
};

pub const BACKUP_VERSION: u32 = 1;

#[allow(async_fn_in_trait)]
pub trait BackupService {
    /// Serializes one routine, bundling every custom exercise it
    /// references, into a portable JSON document.
    async fn export_routine(&self, id: RoutineID) -> Result<String, ReadError>;
    /// Recreates the routine described by a backup document under fresh
    /// ids and returns the new routine.
    async fn import_routine(&self, document: &str) -> Result<Routine, ImportError>;
}

/// Self-contained, portable representation of one routine. Custom
/// exercises are bundled in full (they do not exist on other devices);
/// seeded exercises are referenced by id and assumed present on import.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutineBackup {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub routine: BackupRoutine,
    pub exercises: Vec<BackupExercise>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackupRoutine {
    pub name: String,
    pub tags: Vec<String>,
    pub exercises: Vec<BackupRoutineExercise>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupRoutineExercise {
    pub exercise_id: ExerciseID,
    pub order: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub defaults: Option<ExerciseDefaults>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupExercise {
    pub id: ExerciseID,
    pub base_name: String,
    pub muscles: Vec<String>,
    pub equipment: Vec<String>,
    pub metric_type: MetricType,
    pub is_custom: bool,
    pub source: ExerciseSource,
    pub translations: Vec<BackupTranslation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BackupTranslation {
    pub language: String,
    pub name: String,
}

/// Everything the store needs to materialize an imported routine in one
/// transaction: fresh custom exercises plus the new routine aggregate,
/// memberships already remapped to the fresh ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPlan {
    pub routine_id: RoutineID,
    pub name: Name,
    pub tags: Vec<String>,
    pub new_exercises: Vec<(Exercise, Vec<ExerciseTranslation>)>,
    /// Ordered exercise memberships with their defaults.
    pub entries: Vec<(ExerciseID, ExerciseDefaults)>,
    pub created_at: DateTime<Utc>,
}

#[must_use]
pub fn export_document(
    detail: &RoutineDetail,
    custom_exercises: &[ExerciseWithTranslations],
    created_at: DateTime<Utc>,
) -> RoutineBackup {
    RoutineBackup {
        version: BACKUP_VERSION,
        created_at,
        routine: BackupRoutine {
            name: detail.routine.name.as_ref().to_string(),
            tags: detail.tags.clone(),
            exercises: detail
                .exercises
                .iter()
                .map(|e| BackupRoutineExercise {
                    exercise_id: e.exercise_id,
                    order: e.position,
                    defaults: detail.defaults.get(&e.exercise_id).cloned(),
                })
                .collect(),
        },
        exercises: custom_exercises
            .iter()
            .map(|e| BackupExercise {
                id: e.exercise.id,
                base_name: e.exercise.name.as_ref().to_string(),
                muscles: e.exercise.muscles.clone(),
                equipment: e.exercise.equipment.clone(),
                metric_type: e.exercise.metric,
                is_custom: true,
                source: ExerciseSource::Custom,
                translations: e
                    .translations
                    .iter()
                    .map(|t| BackupTranslation {
                        language: t.language.clone(),
                        name: t.name.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn encode(backup: &RoutineBackup) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(backup)
}

/// Decodes a backup document, rejecting malformed JSON and any version tag
/// other than [`BACKUP_VERSION`].
pub fn parse(document: &str) -> Result<RoutineBackup, ImportError> {
    let backup: RoutineBackup =
        serde_json::from_str(document).map_err(|_| ImportError::InvalidBackup)?;
    if backup.version != BACKUP_VERSION {
        return Err(ImportError::InvalidBackup);
    }
    Ok(backup)
}

/// Turns a parsed backup into an import plan. Every bundled custom
/// exercise gets a fresh id (source ids are never reused, other devices
/// may have colliding ones); membership references are remapped through
/// the old to new map and otherwise kept as-is, assumed to point at a
/// seeded exercise.
pub fn plan_import(backup: RoutineBackup, now: DateTime<Utc>) -> Result<ImportPlan, ImportError> {
    let name = Name::new(&backup.routine.name).map_err(|_| ImportError::InvalidBackup)?;

    let mut id_map: BTreeMap<ExerciseID, ExerciseID> = BTreeMap::new();
    let mut new_exercises = Vec::with_capacity(backup.exercises.len());
    for bundled in backup.exercises {
        let new_id = ExerciseID::new();
        id_map.insert(bundled.id, new_id);
        let exercise = Exercise {
            id: new_id,
            name: Name::new(&bundled.base_name).map_err(|_| ImportError::InvalidBackup)?,
            muscles: bundled.muscles,
            equipment: bundled.equipment,
            metric: bundled.metric_type,
            custom: true,
            source: ExerciseSource::Custom,
            created_at: now,
        };
        let translations = bundled
            .translations
            .into_iter()
            .map(|t| ExerciseTranslation {
                exercise_id: new_id,
                language: t.language,
                name: t.name,
            })
            .collect();
        new_exercises.push((exercise, translations));
    }

    let mut memberships = backup.routine.exercises;
    memberships.sort_by_key(|e| e.order);
    let entries = memberships
        .into_iter()
        .map(|e| {
            let exercise_id = id_map.get(&e.exercise_id).copied().unwrap_or(e.exercise_id);
            (exercise_id, e.defaults.unwrap_or_default())
        })
        .collect();

    Ok(ImportPlan {
        routine_id: RoutineID::new(),
        name,
        tags: backup.routine.tags,
        new_exercises,
        entries,
        created_at: now,
    })
}
