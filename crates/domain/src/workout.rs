use chrono::{DateTime, Utc};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CreateError, DeleteError, ExerciseID, ReadError, RoutineID};

#[allow(async_fn_in_trait)]
pub trait WorkoutService {
    async fn get_workouts_since(&self, since: DateTime<Utc>) -> Result<Vec<Workout>, ReadError>;
    async fn get_workout_exercises(
        &self,
        workout_id: WorkoutID,
    ) -> Result<Vec<WorkoutExercise>, ReadError>;
    async fn get_workout_sets(
        &self,
        workout_exercise_id: WorkoutExerciseID,
    ) -> Result<Vec<WorkoutSet>, ReadError>;
    async fn delete_workout(&self, id: WorkoutID) -> Result<WorkoutID, DeleteError>;
}

#[allow(async_fn_in_trait)]
pub trait WorkoutRepository {
    /// Persists a finished workout with its exercises and sets in one
    /// transaction.
    async fn create_workout(&self, workout: NewWorkout) -> Result<Workout, CreateError>;
    /// Reads workouts that ended at or after the given instant, newest
    /// first.
    async fn read_workouts_since(&self, since: DateTime<Utc>) -> Result<Vec<Workout>, ReadError>;
    async fn read_last_workout_for_routine(
        &self,
        routine_id: RoutineID,
    ) -> Result<Option<Workout>, ReadError>;
    async fn read_workout_exercises(
        &self,
        workout_id: WorkoutID,
    ) -> Result<Vec<WorkoutExercise>, ReadError>;
    async fn read_workout_sets(
        &self,
        workout_exercise_id: WorkoutExerciseID,
    ) -> Result<Vec<WorkoutSet>, ReadError>;
    /// Reads the sets of the given exercise from the most recent workout
    /// that contains it, ordered by position.
    async fn read_latest_sets(&self, exercise_id: ExerciseID) -> Result<Vec<WorkoutSet>, ReadError>;
    /// Deletes the workout with its exercises and sets in one transaction.
    async fn delete_workout(&self, id: WorkoutID) -> Result<WorkoutID, DeleteError>;
}

/// A finished training session. The routine reference is informational:
/// `routine_name` is denormalized at save time so history survives routine
/// deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    pub id: WorkoutID,
    pub routine_id: Option<RoutineID>,
    pub routine_name: Option<String>,
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl Workout {
    /// Wall-clock duration in whole minutes, never reported below one.
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.ended_at - self.started_at).num_minutes().max(1)
    }
}

#[derive(
    Deref, Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct WorkoutID(Uuid);

impl WorkoutID {
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

impl From<Uuid> for WorkoutID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for WorkoutID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// An exercise performed within a workout. The exercise name is
/// denormalized at save time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutExercise {
    pub id: WorkoutExerciseID,
    pub workout_id: WorkoutID,
    pub exercise_id: ExerciseID,
    pub name: String,
    pub position: u32,
}

#[derive(
    Deref, Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct WorkoutExerciseID(Uuid);

impl WorkoutExerciseID {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for WorkoutExerciseID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for WorkoutExerciseID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// A recorded set. Sets have no identity of their own; they are addressed
/// by (workout exercise, position).
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct WorkoutSet {
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rpe: Option<Rpe>,
    pub completed: bool,
}

/// Rating of perceived exertion, 1 to 10.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rpe(u8);

impl Rpe {
    pub fn new(value: u8) -> Result<Self, RpeError> {
        if (1..=10).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RpeError::OutOfRange(value))
        }
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Rpe {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Rpe::new(value).map_err(serde::de::Error::custom)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RpeError {
    #[error("RPE must be between 1 and 10 ({0} given)")]
    OutOfRange(u8),
}

/// A workout ready to be persisted, produced by finishing an active
/// session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkout {
    pub routine_id: Option<RoutineID>,
    pub routine_name: Option<String>,
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub exercises: Vec<NewWorkoutExercise>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkoutExercise {
    pub exercise_id: ExerciseID,
    pub name: String,
    pub sets: Vec<WorkoutSet>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 1)]
    #[case(30, 1)]
    #[case(59, 1)]
    #[case(60, 1)]
    #[case(61, 1)]
    #[case(120, 2)]
    #[case(3600, 60)]
    fn test_duration_minutes_clamps_to_one(#[case] seconds: i64, #[case] expected: i64) {
        let started_at = DateTime::UNIX_EPOCH;
        let workout = Workout {
            id: 1.into(),
            routine_id: None,
            routine_name: None,
            tags: vec![],
            started_at,
            ended_at: started_at + TimeDelta::seconds(seconds),
        };
        assert_eq!(workout.duration_minutes(), expected);
    }

    #[rstest]
    #[case(0, Err(RpeError::OutOfRange(0)))]
    #[case(1, Ok(Rpe(1)))]
    #[case(10, Ok(Rpe(10)))]
    #[case(11, Err(RpeError::OutOfRange(11)))]
    fn test_rpe_new(#[case] value: u8, #[case] expected: Result<Rpe, RpeError>) {
        assert_eq!(Rpe::new(value), expected);
    }
}
