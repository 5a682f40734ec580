use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CreateError, DeleteError, ExerciseID, Name, ReadError, UpdateError, backup::ImportPlan,
};

#[allow(async_fn_in_trait)]
pub trait RoutineService {
    async fn get_routines(&self) -> Result<Vec<Routine>, ReadError>;
    async fn create_routine(&self, name: Name, tags: Vec<String>) -> Result<Routine, CreateError>;
    async fn update_routine(
        &self,
        id: RoutineID,
        name: Name,
        tags: Vec<String>,
    ) -> Result<Routine, UpdateError>;
    async fn delete_routine(&self, id: RoutineID) -> Result<RoutineID, DeleteError>;
    async fn duplicate_routine(&self, id: RoutineID) -> Result<Routine, CreateError>;
    async fn move_routine(&self, id: RoutineID, direction: Direction) -> Result<(), UpdateError>;
    async fn add_exercise_to_routine(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError>;
    async fn remove_exercise_from_routine(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError>;
    async fn move_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        direction: Direction,
    ) -> Result<(), UpdateError>;
    async fn set_routine_exercise_defaults(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        defaults: ExerciseDefaults,
    ) -> Result<(), UpdateError>;
    async fn get_routine_detail(&self, id: RoutineID) -> Result<RoutineDetail, ReadError>;
    async fn get_routine_versions(&self, id: RoutineID) -> Result<Vec<RoutineVersion>, ReadError>;
}

#[allow(async_fn_in_trait)]
pub trait RoutineRepository {
    /// Reads all routines ordered by position.
    async fn read_routines(&self) -> Result<Vec<Routine>, ReadError>;
    async fn create_routine(&self, name: Name, tags: Vec<String>) -> Result<Routine, CreateError>;
    /// Replaces name and tags wholesale and appends a version snapshot.
    async fn update_routine(
        &self,
        id: RoutineID,
        name: Name,
        tags: Vec<String>,
    ) -> Result<Routine, UpdateError>;
    /// Deletes the routine and all of its tags, exercise memberships,
    /// defaults and version snapshots in one transaction.
    async fn delete_routine(&self, id: RoutineID) -> Result<RoutineID, DeleteError>;
    async fn duplicate_routine(&self, id: RoutineID) -> Result<Routine, CreateError>;
    async fn reorder_routine(&self, id: RoutineID, direction: Direction)
    -> Result<(), UpdateError>;
    async fn add_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError>;
    async fn remove_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError>;
    async fn reorder_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        direction: Direction,
    ) -> Result<(), UpdateError>;
    /// Upserts the whole defaults record for the pair; omitted fields
    /// become absent rather than being merged.
    async fn set_exercise_defaults(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        defaults: ExerciseDefaults,
    ) -> Result<(), UpdateError>;
    async fn read_routine_detail(&self, id: RoutineID) -> Result<RoutineDetail, ReadError>;
    /// Archival read of the append-only version log, newest first.
    async fn read_routine_versions(&self, id: RoutineID)
    -> Result<Vec<RoutineVersion>, ReadError>;
    /// Overwrites the routine's exercise memberships and defaults with the
    /// given ordered entries and appends a version snapshot.
    async fn replace_routine_exercises(
        &self,
        id: RoutineID,
        entries: Vec<(ExerciseID, ExerciseDefaults)>,
    ) -> Result<(), UpdateError>;
    /// Executes an import plan (new custom exercises plus a new routine
    /// aggregate) in one transaction and returns the created routine.
    async fn import_routine(&self, plan: ImportPlan) -> Result<Routine, CreateError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub id: RoutineID,
    pub name: Name,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Dense display order among all routines (0..N-1).
    pub position: u32,
}

#[derive(
    Deref, Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct RoutineID(Uuid);

impl RoutineID {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for RoutineID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for RoutineID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineExercise {
    pub routine_id: RoutineID,
    pub exercise_id: ExerciseID,
    /// Dense order within the routine (0..M-1).
    pub position: u32,
}

/// Suggested prescription for an exercise within a routine. Upserted as a
/// whole record; callers build the merged record before writing.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct ExerciseDefaults {
    #[serde(rename = "defaultSets", skip_serializing_if = "Option::is_none", default)]
    pub sets: Option<u32>,
    #[serde(rename = "defaultReps", skip_serializing_if = "Option::is_none", default)]
    pub reps: Option<u32>,
    #[serde(rename = "defaultWeight", skip_serializing_if = "Option::is_none", default)]
    pub weight: Option<f64>,
    #[serde(
        rename = "defaultDuration",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub duration: Option<u32>,
    #[serde(
        rename = "defaultDistance",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub distance: Option<f64>,
    #[serde(
        rename = "defaultRestSeconds",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub rest_seconds: Option<u32>,
}

impl ExerciseDefaults {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == ExerciseDefaults::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDetail {
    pub routine: Routine,
    pub tags: Vec<String>,
    /// Exercise memberships ordered by position.
    pub exercises: Vec<RoutineExercise>,
    pub defaults: BTreeMap<ExerciseID, ExerciseDefaults>,
}

/// Append-only log entry written as a side effect of every structural or
/// metadata change to a routine. Never updated; deleted only when the
/// routine itself is deleted. The log is archival and is not read back for
/// rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineVersion {
    pub id: RoutineVersionID,
    pub routine_id: RoutineID,
    pub created_at: DateTime<Utc>,
    pub name: String,
    /// JSON-serialized [`RoutineSnapshot`].
    pub snapshot: String,
}

#[derive(
    Deref, Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct RoutineVersionID(Uuid);

impl RoutineVersionID {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for RoutineVersionID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for RoutineVersionID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// The state captured by a version log entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutineSnapshot {
    pub name: String,
    pub tags: Vec<String>,
    pub exercises: Vec<SnapshotExercise>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotExercise {
    #[serde(rename = "exerciseId")]
    pub exercise_id: ExerciseID,
    #[serde(rename = "order")]
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub defaults: Option<ExerciseDefaults>,
}

impl RoutineSnapshot {
    #[must_use]
    pub fn new(
        name: &Name,
        tags: &[String],
        exercises: &[RoutineExercise],
        defaults: &BTreeMap<ExerciseID, ExerciseDefaults>,
    ) -> Self {
        Self {
            name: name.as_ref().to_string(),
            tags: tags.to_vec(),
            exercises: exercises
                .iter()
                .map(|e| SnapshotExercise {
                    exercise_id: e.exercise_id,
                    position: e.position,
                    defaults: defaults.get(&e.exercise_id).cloned(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_routine_snapshot_inlines_defaults() {
        let routine_id = RoutineID::from(1);
        let exercises = vec![
            RoutineExercise {
                routine_id,
                exercise_id: 1.into(),
                position: 0,
            },
            RoutineExercise {
                routine_id,
                exercise_id: 2.into(),
                position: 1,
            },
        ];
        let defaults = BTreeMap::from([(
            ExerciseID::from(2),
            ExerciseDefaults {
                sets: Some(4),
                reps: Some(8),
                ..ExerciseDefaults::default()
            },
        )]);

        let snapshot = RoutineSnapshot::new(
            &Name::new("Empuje").unwrap(),
            &["lunes".to_string()],
            &exercises,
            &defaults,
        );

        assert_eq!(snapshot.exercises.len(), 2);
        assert_eq!(snapshot.exercises[0].defaults, None);
        assert_eq!(
            snapshot.exercises[1].defaults.as_ref().and_then(|d| d.sets),
            Some(4)
        );
    }

    #[test]
    fn test_routine_snapshot_serialization_field_names() {
        let snapshot = RoutineSnapshot::new(
            &Name::new("Pierna").unwrap(),
            &[],
            &[RoutineExercise {
                routine_id: RoutineID::from(1),
                exercise_id: 3.into(),
                position: 0,
            }],
            &BTreeMap::new(),
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"exerciseId\""));
        assert!(json.contains("\"order\":0"));
    }

    #[test]
    fn test_exercise_defaults_is_empty() {
        assert!(ExerciseDefaults::default().is_empty());
        assert!(
            !ExerciseDefaults {
                reps: Some(5),
                ..ExerciseDefaults::default()
            }
            .is_empty()
        );
    }
}
