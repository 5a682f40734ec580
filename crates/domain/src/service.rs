use std::collections::BTreeMap;

use chrono::{TimeDelta, Utc};
use log::error;

use crate::{
    BackupService, CreateError, DeleteError, Direction, Exercise, ExerciseFilter, ExerciseID,
    ExerciseRepository, ExerciseService, ExerciseSource, ExerciseTranslation,
    ExerciseWithTranslations, Favorite, ImportError, MetricType, Name, PreviousSet, ReadError,
    Recent, Routine, RoutineDetail, RoutineID, RoutineRepository, RoutineService, RoutineVersion,
    SessionError, SessionID, SessionRepository, SessionService, Settings, SettingsRepository,
    SettingsService, StatsAccumulator, StatsService, TrainingStats, UpdateError, Workout,
    WorkoutExercise, WorkoutExerciseID, WorkoutID, WorkoutRepository, WorkoutService,
    WorkoutSession, WorkoutSet, backup, catalog,
    routine::ExerciseDefaults,
    session::{SessionExercise, infer_defaults, plan_sets},
};

pub struct Service<R> {
    repository: R,
}

impl<R> Service<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

macro_rules! log_on_error {
    ($func: expr, $action: literal, $entity: literal) => {{
        let result = $func.await;
        if let Err(ref err) = result {
            error!("failed to {} {}: {err}", $action, $entity);
        }
        result
    }};
}

impl<R: ExerciseRepository> ExerciseService for Service<R> {
    async fn seed_catalog(&self) -> Result<bool, CreateError> {
        log_on_error!(
            self.repository
                .seed_exercises(catalog::seed_records(Utc::now())),
            "seed",
            "exercise catalog"
        )
    }

    async fn get_exercises(
        &self,
        filter: &ExerciseFilter,
    ) -> Result<Vec<ExerciseWithTranslations>, ReadError> {
        log_on_error!(self.repository.read_exercises(filter), "get", "exercises")
    }

    async fn get_exercise(&self, id: ExerciseID) -> Result<ExerciseWithTranslations, ReadError> {
        log_on_error!(self.repository.read_exercise(id), "get", "exercise")
    }

    async fn create_custom_exercise(
        &self,
        name: Name,
        muscles: Vec<String>,
        equipment: Vec<String>,
        metric: MetricType,
    ) -> Result<Exercise, CreateError> {
        let exercise = Exercise {
            id: ExerciseID::new(),
            name: name.clone(),
            muscles,
            equipment,
            metric,
            custom: true,
            source: ExerciseSource::Custom,
            created_at: Utc::now(),
        };
        let translation = ExerciseTranslation {
            exercise_id: exercise.id,
            language: "es".to_string(),
            name: name.as_ref().to_string(),
        };
        log_on_error!(
            self.repository.create_exercise(exercise, translation),
            "create",
            "exercise"
        )
    }

    async fn update_custom_exercise(
        &self,
        id: ExerciseID,
        name: Name,
        muscles: Vec<String>,
        equipment: Vec<String>,
        metric: MetricType,
    ) -> Result<Exercise, UpdateError> {
        log_on_error!(
            self.repository
                .update_exercise(id, name, muscles, equipment, metric),
            "update",
            "exercise"
        )
    }

    async fn toggle_favorite_exercise(&self, id: ExerciseID) -> Result<bool, UpdateError> {
        log_on_error!(self.repository.toggle_favorite(id), "toggle", "favorite")
    }

    async fn record_recent_exercise(&self, id: ExerciseID) -> Result<(), UpdateError> {
        log_on_error!(self.repository.record_recent(id), "record", "recent")
    }

    async fn get_favorite_exercises(&self) -> Result<Vec<Favorite>, ReadError> {
        log_on_error!(self.repository.read_favorites(), "get", "favorites")
    }

    async fn get_recent_exercises(&self) -> Result<Vec<Recent>, ReadError> {
        log_on_error!(self.repository.read_recents(), "get", "recents")
    }
}

impl<R: RoutineRepository> RoutineService for Service<R> {
    async fn get_routines(&self) -> Result<Vec<Routine>, ReadError> {
        log_on_error!(self.repository.read_routines(), "get", "routines")
    }

    async fn create_routine(&self, name: Name, tags: Vec<String>) -> Result<Routine, CreateError> {
        log_on_error!(
            self.repository.create_routine(name, tags),
            "create",
            "routine"
        )
    }

    async fn update_routine(
        &self,
        id: RoutineID,
        name: Name,
        tags: Vec<String>,
    ) -> Result<Routine, UpdateError> {
        log_on_error!(
            self.repository.update_routine(id, name, tags),
            "update",
            "routine"
        )
    }

    async fn delete_routine(&self, id: RoutineID) -> Result<RoutineID, DeleteError> {
        log_on_error!(self.repository.delete_routine(id), "delete", "routine")
    }

    async fn duplicate_routine(&self, id: RoutineID) -> Result<Routine, CreateError> {
        log_on_error!(
            self.repository.duplicate_routine(id),
            "duplicate",
            "routine"
        )
    }

    async fn move_routine(&self, id: RoutineID, direction: Direction) -> Result<(), UpdateError> {
        log_on_error!(
            self.repository.reorder_routine(id, direction),
            "move",
            "routine"
        )
    }

    async fn add_exercise_to_routine(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError> {
        log_on_error!(
            self.repository.add_routine_exercise(routine_id, exercise_id),
            "add",
            "routine exercise"
        )
    }

    async fn remove_exercise_from_routine(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
    ) -> Result<(), UpdateError> {
        log_on_error!(
            self.repository
                .remove_routine_exercise(routine_id, exercise_id),
            "remove",
            "routine exercise"
        )
    }

    async fn move_routine_exercise(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        direction: Direction,
    ) -> Result<(), UpdateError> {
        log_on_error!(
            self.repository
                .reorder_routine_exercise(routine_id, exercise_id, direction),
            "move",
            "routine exercise"
        )
    }

    async fn set_routine_exercise_defaults(
        &self,
        routine_id: RoutineID,
        exercise_id: ExerciseID,
        defaults: ExerciseDefaults,
    ) -> Result<(), UpdateError> {
        log_on_error!(
            self.repository
                .set_exercise_defaults(routine_id, exercise_id, defaults),
            "set",
            "exercise defaults"
        )
    }

    async fn get_routine_detail(&self, id: RoutineID) -> Result<RoutineDetail, ReadError> {
        log_on_error!(
            self.repository.read_routine_detail(id),
            "get",
            "routine detail"
        )
    }

    async fn get_routine_versions(&self, id: RoutineID) -> Result<Vec<RoutineVersion>, ReadError> {
        log_on_error!(
            self.repository.read_routine_versions(id),
            "get",
            "routine versions"
        )
    }
}

impl<R> BackupService for Service<R>
where
    R: RoutineRepository + ExerciseRepository,
{
    async fn export_routine(&self, id: RoutineID) -> Result<String, ReadError> {
        let detail = self.repository.read_routine_detail(id).await?;
        let mut custom_exercises = Vec::new();
        for membership in &detail.exercises {
            let exercise = self.repository.read_exercise(membership.exercise_id).await?;
            if exercise.exercise.custom {
                custom_exercises.push(exercise);
            }
        }
        let document = backup::export_document(&detail, &custom_exercises, Utc::now());
        backup::encode(&document).map_err(|err| ReadError::Other(Box::new(err)))
    }

    async fn import_routine(&self, document: &str) -> Result<Routine, ImportError> {
        let parsed = backup::parse(document)?;
        let plan = backup::plan_import(parsed, Utc::now())?;
        Ok(self.repository.import_routine(plan).await?)
    }
}

impl<R> SessionService for Service<R>
where
    R: RoutineRepository
        + ExerciseRepository
        + WorkoutRepository
        + SessionRepository
        + SettingsRepository,
{
    async fn start_session_from_routine(
        &self,
        routine_id: RoutineID,
    ) -> Result<WorkoutSession, SessionError> {
        let detail = self.repository.read_routine_detail(routine_id).await?;
        let settings = self.repository.read_settings().await?;
        let language = settings.language.to_string();

        let last_workout = self
            .repository
            .read_last_workout_for_routine(routine_id)
            .await?;
        let last_exercises = match &last_workout {
            Some(workout) => self.repository.read_workout_exercises(workout.id).await?,
            None => vec![],
        };

        let mut exercises = Vec::with_capacity(detail.exercises.len());
        for membership in &detail.exercises {
            let exercise = self.repository.read_exercise(membership.exercise_id).await?;
            let defaults = detail.defaults.get(&membership.exercise_id);

            // Prefer this exercise's sets from the routine's preceding
            // workout; otherwise its most recent sets from any workout.
            let history = match last_exercises
                .iter()
                .find(|e| e.exercise_id == membership.exercise_id)
            {
                Some(performed) => self.repository.read_workout_sets(performed.id).await?,
                None => self.repository.read_latest_sets(membership.exercise_id).await?,
            };
            let previous_sets: Vec<PreviousSet> = history.iter().map(PreviousSet::from).collect();

            exercises.push(SessionExercise {
                exercise_id: membership.exercise_id,
                name: exercise.display_name(&language).to_string(),
                metric_type: exercise.exercise.metric,
                rest_seconds: defaults.and_then(|d| d.rest_seconds),
                previous_sets: (!previous_sets.is_empty()).then_some(previous_sets),
                sets: plan_sets(exercise.exercise.metric, defaults),
            });
        }

        let session = WorkoutSession {
            id: SessionID::new(),
            created_at: Utc::now(),
            routine_id: Some(routine_id),
            routine_name: Some(detail.routine.name.as_ref().to_string()),
            tags: (!detail.tags.is_empty()).then(|| detail.tags.clone()),
            original_exercise_ids: Some(
                detail.exercises.iter().map(|e| e.exercise_id).collect(),
            ),
            exercises,
        };
        self.repository
            .write_active_session(Some(session.clone()))
            .await?;
        Ok(session)
    }

    async fn start_empty_session(&self) -> Result<WorkoutSession, SessionError> {
        let session = WorkoutSession {
            id: SessionID::new(),
            created_at: Utc::now(),
            routine_id: None,
            routine_name: None,
            tags: None,
            original_exercise_ids: None,
            exercises: vec![],
        };
        self.repository
            .write_active_session(Some(session.clone()))
            .await?;
        Ok(session)
    }

    async fn get_active_session(&self) -> Result<Option<WorkoutSession>, ReadError> {
        log_on_error!(
            self.repository.read_active_session(),
            "get",
            "active session"
        )
    }

    async fn update_active_session(&self, session: WorkoutSession) -> Result<(), UpdateError> {
        log_on_error!(
            self.repository.write_active_session(Some(session)),
            "update",
            "active session"
        )
    }

    async fn finish_session(&self, update_template: bool) -> Result<Workout, SessionError> {
        let Some(session) = self.repository.read_active_session().await? else {
            return Err(SessionError::Read(ReadError::NotFound));
        };

        if update_template
            && session.template_diverged()
            && let Some(routine_id) = session.routine_id
        {
            let detail = self.repository.read_routine_detail(routine_id).await?;
            let entries = session
                .exercises
                .iter()
                .map(|exercise| {
                    let defaults = detail
                        .defaults
                        .get(&exercise.exercise_id)
                        .cloned()
                        .unwrap_or_else(|| infer_defaults(exercise));
                    (exercise.exercise_id, defaults)
                })
                .collect();
            self.repository
                .replace_routine_exercises(routine_id, entries)
                .await?;
        }

        let workout = self
            .repository
            .create_workout(session.into_workout(Utc::now()))
            .await?;
        self.repository.write_active_session(None).await?;
        Ok(workout)
    }

    async fn discard_session(&self) -> Result<(), UpdateError> {
        log_on_error!(
            self.repository.write_active_session(None),
            "discard",
            "active session"
        )
    }
}

impl<R> StatsService for Service<R>
where
    R: WorkoutRepository + ExerciseRepository + SettingsRepository,
{
    async fn get_training_stats(&self, days: Option<u32>) -> Result<TrainingStats, ReadError> {
        let days = match days {
            Some(days) => days,
            None => self.repository.read_settings().await?.stats_range_days,
        };
        let cutoff = Utc::now() - TimeDelta::days(i64::from(days));

        let workouts = self.repository.read_workouts_since(cutoff).await?;
        let mut muscles: BTreeMap<ExerciseID, Vec<String>> = BTreeMap::new();
        let mut accumulator = StatsAccumulator::new();

        for workout in workouts {
            let exercises = self.repository.read_workout_exercises(workout.id).await?;
            let mut with_sets: Vec<(WorkoutExercise, Vec<WorkoutSet>)> =
                Vec::with_capacity(exercises.len());
            for exercise in exercises {
                if !muscles.contains_key(&exercise.exercise_id) {
                    // History keeps its denormalized name even when the
                    // exercise has been deleted; such rows just contribute
                    // nothing to the muscle map.
                    let tags = match self.repository.read_exercise(exercise.exercise_id).await {
                        Ok(e) => e.exercise.muscles,
                        Err(ReadError::NotFound) => vec![],
                        Err(err) => return Err(err),
                    };
                    muscles.insert(exercise.exercise_id, tags);
                }
                let sets = self.repository.read_workout_sets(exercise.id).await?;
                with_sets.push((exercise, sets));
            }
            accumulator.add_workout(workout, &with_sets, &muscles);
        }

        Ok(accumulator.finish())
    }
}

impl<R: WorkoutRepository> WorkoutService for Service<R> {
    async fn get_workouts_since(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> Result<Vec<Workout>, ReadError> {
        log_on_error!(
            self.repository.read_workouts_since(since),
            "get",
            "workouts"
        )
    }

    async fn get_workout_exercises(
        &self,
        workout_id: WorkoutID,
    ) -> Result<Vec<WorkoutExercise>, ReadError> {
        log_on_error!(
            self.repository.read_workout_exercises(workout_id),
            "get",
            "workout exercises"
        )
    }

    async fn get_workout_sets(
        &self,
        workout_exercise_id: WorkoutExerciseID,
    ) -> Result<Vec<WorkoutSet>, ReadError> {
        log_on_error!(
            self.repository.read_workout_sets(workout_exercise_id),
            "get",
            "workout sets"
        )
    }

    async fn delete_workout(&self, id: WorkoutID) -> Result<WorkoutID, DeleteError> {
        log_on_error!(self.repository.delete_workout(id), "delete", "workout")
    }
}

impl<R: SettingsRepository> SettingsService for Service<R> {
    async fn get_settings(&self) -> Result<Settings, ReadError> {
        log_on_error!(self.repository.read_settings(), "get", "settings")
    }

    async fn set_settings(&self, settings: Settings) -> Result<Settings, UpdateError> {
        log_on_error!(
            self.repository.write_settings(settings),
            "set",
            "settings"
        )
    }
}
