use chrono::{DateTime, Utc};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CreateError, Name, ReadError, UpdateError, normalize_name};

#[allow(async_fn_in_trait)]
pub trait ExerciseService {
    async fn seed_catalog(&self) -> Result<bool, CreateError>;
    async fn get_exercises(
        &self,
        filter: &ExerciseFilter,
    ) -> Result<Vec<ExerciseWithTranslations>, ReadError>;
    async fn get_exercise(&self, id: ExerciseID) -> Result<ExerciseWithTranslations, ReadError>;
    async fn create_custom_exercise(
        &self,
        name: Name,
        muscles: Vec<String>,
        equipment: Vec<String>,
        metric: MetricType,
    ) -> Result<Exercise, CreateError>;
    async fn update_custom_exercise(
        &self,
        id: ExerciseID,
        name: Name,
        muscles: Vec<String>,
        equipment: Vec<String>,
        metric: MetricType,
    ) -> Result<Exercise, UpdateError>;
    async fn toggle_favorite_exercise(&self, id: ExerciseID) -> Result<bool, UpdateError>;
    async fn record_recent_exercise(&self, id: ExerciseID) -> Result<(), UpdateError>;
    async fn get_favorite_exercises(&self) -> Result<Vec<Favorite>, ReadError>;
    async fn get_recent_exercises(&self) -> Result<Vec<Recent>, ReadError>;
}

#[allow(async_fn_in_trait)]
pub trait ExerciseRepository {
    /// Inserts the bundled catalog in one transaction, but only when the
    /// exercise table is empty. Returns whether anything was inserted.
    async fn seed_exercises(
        &self,
        exercises: Vec<(Exercise, Vec<ExerciseTranslation>)>,
    ) -> Result<bool, CreateError>;
    async fn read_exercises(
        &self,
        filter: &ExerciseFilter,
    ) -> Result<Vec<ExerciseWithTranslations>, ReadError>;
    async fn read_exercise(&self, id: ExerciseID) -> Result<ExerciseWithTranslations, ReadError>;
    async fn create_exercise(
        &self,
        exercise: Exercise,
        translation: ExerciseTranslation,
    ) -> Result<Exercise, CreateError>;
    async fn update_exercise(
        &self,
        id: ExerciseID,
        name: Name,
        muscles: Vec<String>,
        equipment: Vec<String>,
        metric: MetricType,
    ) -> Result<Exercise, UpdateError>;
    async fn toggle_favorite(&self, id: ExerciseID) -> Result<bool, UpdateError>;
    async fn record_recent(&self, id: ExerciseID) -> Result<(), UpdateError>;
    async fn read_favorites(&self) -> Result<Vec<Favorite>, ReadError>;
    async fn read_recents(&self) -> Result<Vec<Recent>, ReadError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub id: ExerciseID,
    pub name: Name,
    pub muscles: Vec<String>,
    pub equipment: Vec<String>,
    pub metric: MetricType,
    pub custom: bool,
    pub source: ExerciseSource,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    #[must_use]
    pub fn normalized_name(&self) -> String {
        self.name.normalized()
    }
}

#[derive(
    Deref, Serialize, Deserialize, Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct ExerciseID(Uuid);

impl ExerciseID {
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

impl From<Uuid> for ExerciseID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for ExerciseID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// How an exercise measures a set. Field applicability of set values and
/// default prescriptions is derived from this kind, so a time exercise
/// never carries a distance prescription.
#[derive(
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetricType {
    WeightReps,
    Reps,
    Time,
    Distance,
}

#[derive(
    Serialize, Deserialize, strum::Display, strum::EnumString, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExerciseSource {
    Seeded,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseTranslation {
    pub exercise_id: ExerciseID,
    pub language: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseWithTranslations {
    pub exercise: Exercise,
    pub translations: Vec<ExerciseTranslation>,
}

impl ExerciseWithTranslations {
    /// Resolves the display name: requested language, then Spanish, then
    /// English, then the base name.
    #[must_use]
    pub fn display_name(&self, language: &str) -> &str {
        [language, "es", "en"]
            .iter()
            .find_map(|l| self.translations.iter().find(|t| t.language == *l))
            .map_or(self.exercise.name.as_ref(), |t| t.name.as_str())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExerciseFilter {
    pub query: Option<String>,
    pub muscle: Option<String>,
    pub equipment: Option<String>,
}

impl ExerciseFilter {
    #[must_use]
    pub fn normalized_query(&self) -> Option<String> {
        self.query.as_deref().map(normalize_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favorite {
    pub exercise_id: ExerciseID,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recent {
    pub exercise_id: ExerciseID,
    pub last_used_at: DateTime<Utc>,
}
