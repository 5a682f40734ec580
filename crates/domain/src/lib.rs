#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod backup;
pub mod catalog;
mod error;
mod exercise;
mod name;
mod routine;
mod service;
mod session;
mod settings;
mod statistics;
mod workout;

pub use backup::{BACKUP_VERSION, BackupService, ImportPlan, RoutineBackup};
pub use error::{
    CreateError, DeleteError, ImportError, ReadError, SessionError, StorageError, UpdateError,
};
pub use exercise::{
    Exercise, ExerciseFilter, ExerciseID, ExerciseRepository, ExerciseService, ExerciseSource,
    ExerciseTranslation, ExerciseWithTranslations, Favorite, MetricType, Recent,
};
pub use name::{Name, NameError, normalize_name};
pub use routine::{
    Direction, ExerciseDefaults, Routine, RoutineDetail, RoutineExercise, RoutineID,
    RoutineRepository, RoutineService, RoutineSnapshot, RoutineVersion, RoutineVersionID,
    SnapshotExercise,
};
pub use service::Service;
pub use session::{
    PreviousSet, SessionExercise, SessionID, SessionRepository, SessionService, SessionSet,
    SetPrescription, WorkoutSession, infer_defaults, match_previous, plan_sets,
};
pub use settings::{Language, Settings, SettingsRepository, SettingsService, Theme, Units};
pub use statistics::{
    OneRepMaxRecord, StatsAccumulator, StatsService, TrainingStats, WorkoutSummary, one_rep_max,
};
pub use workout::{
    NewWorkout, NewWorkoutExercise, Rpe, RpeError, Workout, WorkoutExercise, WorkoutExerciseID,
    WorkoutID, WorkoutRepository, WorkoutService, WorkoutSet,
};
