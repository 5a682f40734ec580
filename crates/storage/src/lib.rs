#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod schema;
mod session_file;
mod sqlite;

use std::path::Path;

use chrono::{DateTime, Utc};
use entreno_domain::{
    CreateError, DeleteError, Direction, Exercise, ExerciseDefaults, ExerciseFilter, ExerciseID,
    ExerciseRepository, ExerciseTranslation, ExerciseWithTranslations, Favorite, ImportPlan,
    MetricType, Name, NewWorkout, ReadError, Recent, Routine, RoutineDetail, RoutineID,
    RoutineRepository, RoutineVersion, SessionRepository, Settings, SettingsRepository,
    StorageError, UpdateError, Workout, WorkoutExercise, WorkoutExerciseID, WorkoutID,
    WorkoutRepository, WorkoutSession, WorkoutSet,
};

pub use session_file::FileSessionStore;
pub use sqlite::SqliteStore;

/// On-device store: the relational tables in SQLite plus the file-backed
/// active-session slot, presented as one repository.
pub struct LocalStore {
    db: SqliteStore,
    sessions: FileSessionStore,
}

impl LocalStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        Ok(Self {
            db: SqliteStore::open(data_dir.join("entreno.db"))?,
            sessions: FileSessionStore::new(data_dir.join("active_session.json")),
        })
    }

    #[must_use]
    pub fn new(db: SqliteStore, sessions: FileSessionStore) -> Self {
        Self { db, sessions }
    }
}

impl ExerciseRepository for LocalStore {
    async fn seed_exercises(
        &self,
        exercises: Vec<(Exercise, Vec<ExerciseTranslation>)>,
    ) -> Result<bool, CreateError> {
        self.db.seed_exercises(exercises).await
    }

    async fn read_exercises(
        &self,
        filter: &ExerciseFilter,
    ) -> Result<Vec<ExerciseWithTranslations>, ReadError> {
        self.db.read_exercises(filter).await
    }

    async fn read_exercise(&self, id: ExerciseID) -> Result<ExerciseWithTranslations, ReadError> {
        self.db.read_exercise(id).await
    }

    async fn create_exercise(
        &self,
        exercise: Exercise,
        translation: ExerciseTranslation,
    ) -> Result<Exercise, CreateError> {
        self.db.create_exercise(exercise, translation).await
    }

    async fn update_exercise(
        &self,
        id: ExerciseID,
        name: Name,
        muscles: Vec<String>,
        equipment: Vec<String>,
        metric: MetricType,
    ) -> Result<Exercise, UpdateError> {
        self.db
            .update_exercise(id, name, muscles, equipment, metric)
            .await
    }

    async fn toggle_favorite(&self, id: ExerciseID) -> Result<bool, UpdateError> {
        self.db.toggle_favorite(id).await
    }

    async fn record_recent(&self, id: ExerciseID) -> Result<(), UpdateError> {
        self.db.record_recent(id).await
    }

    async fn read_favorites(&self) -> Result<Vec<Favorite>, ReadError> {
        self.db.read_favorites().await
    }

    async fn read_recents(&self) -> Result<Vec<Recent>, ReadError> {
        self.db.read_recents().await
    }
}

impl RoutineRepository for LocalStore {
    async fn read_routines(&self) -> Result<Vec<Routine>, ReadError> {
        self.db.read_routines().await
    }

    async fn create_routine(&self, name: Name, tags: Vec<String>) -> Result<Routine, CreateError> {
        self.db.create_routine(name, tags).await
    }

    async fn update_routine(
        &self,
        id: RoutineID,
        name: Name,
        tags: Vec<String>,
    ) -> Result<Routine, UpdateError> {
        self.db.update_routine(id, name, tags).await
    }

    async fn delete_routine(&self, id: RoutineID) -> Result<RoutineID, DeleteError> {
        self.db.delete_routine(id).await
    }

    async fn duplicate_routine(&self, id: RoutineID) -> Result<Routine, CreateError> {
        self.db.duplicate_routine(id).await
    }

    async fn reorder_routine(
        &self,
        id: RoutineID,
        direction: Direction,
    ) -> Result<(), UpdateError> {
        self.db.reorder_routine(id, direction).await
    }

    async fn add_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError> {
        self.db.add_routine_exercise(routine_id, exercise_id).await
    }

    async fn remove_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError> {
        self.db
            .remove_routine_exercise(routine_id, exercise_id)
            .await
    }

    async fn reorder_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        direction: Direction,
    ) -> Result<(), UpdateError> {
        self.db
            .reorder_routine_exercise(routine_id, exercise_id, direction)
            .await
    }

    async fn set_exercise_defaults(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        defaults: ExerciseDefaults,
    ) -> Result<(), UpdateError> {
        self.db
            .set_exercise_defaults(routine_id, exercise_id, defaults)
            .await
    }

    async fn read_routine_detail(&self, id: RoutineID) -> Result<RoutineDetail, ReadError> {
        self.db.read_routine_detail(id).await
    }

    async fn read_routine_versions(
        &self,
        id: RoutineID,
    ) -> Result<Vec<RoutineVersion>, ReadError> {
        self.db.read_routine_versions(id).await
    }

    async fn replace_routine_exercises(
        &self,
        id: RoutineID,
        entries: Vec<(ExerciseID, ExerciseDefaults)>,
    ) -> Result<(), UpdateError> {
        self.db.replace_routine_exercises(id, entries).await
    }

    async fn import_routine(&self, plan: ImportPlan) -> Result<Routine, CreateError> {
        self.db.import_routine(plan).await
    }
}

impl WorkoutRepository for LocalStore {
    async fn create_workout(&self, workout: NewWorkout) -> Result<Workout, CreateError> {
        self.db.create_workout(workout).await
    }

    async fn read_workouts_since(&self, since: DateTime<Utc>) -> Result<Vec<Workout>, ReadError> {
        self.db.read_workouts_since(since).await
    }

    async fn read_last_workout_for_routine(
        &self,
        routine_id: RoutineID,
    ) -> Result<Option<Workout>, ReadError> {
        self.db.read_last_workout_for_routine(routine_id).await
    }

    async fn read_workout_exercises(
        &self,
        workout_id: WorkoutID,
    ) -> Result<Vec<WorkoutExercise>, ReadError> {
        self.db.read_workout_exercises(workout_id).await
    }

    async fn read_workout_sets(
        &self,
        workout_exercise_id: WorkoutExerciseID,
    ) -> Result<Vec<WorkoutSet>, ReadError> {
        self.db.read_workout_sets(workout_exercise_id).await
    }

    async fn read_latest_sets(
        &self,
        exercise_id: ExerciseID,
    ) -> Result<Vec<WorkoutSet>, ReadError> {
        self.db.read_latest_sets(exercise_id).await
    }

    async fn delete_workout(&self, id: WorkoutID) -> Result<WorkoutID, DeleteError> {
        self.db.delete_workout(id).await
    }
}

impl SessionRepository for LocalStore {
    async fn read_active_session(&self) -> Result<Option<WorkoutSession>, ReadError> {
        self.sessions.read_active_session().await
    }

    async fn write_active_session(
        &self,
        session: Option<WorkoutSession>,
    ) -> Result<(), UpdateError> {
        self.sessions.write_active_session(session).await
    }
}

impl SettingsRepository for LocalStore {
    async fn read_settings(&self) -> Result<Settings, ReadError> {
        self.db.read_settings().await
    }

    async fn write_settings(&self, settings: Settings) -> Result<Settings, UpdateError> {
        self.db.write_settings(settings).await
    }
}
