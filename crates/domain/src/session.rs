use chrono::{DateTime, Utc};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ExerciseID, MetricType, NewWorkout, NewWorkoutExercise, ReadError, RoutineID, Rpe,
    SessionError, UpdateError, Workout, WorkoutSet, routine::ExerciseDefaults,
};

#[allow(async_fn_in_trait)]
pub trait SessionService {
    /// Projects a routine template plus prior history into a fresh
    /// editable session and makes it the active one, replacing any other.
    async fn start_session_from_routine(
        &self,
        routine_id: RoutineID,
    ) -> Result<WorkoutSession, SessionError>;
    async fn start_empty_session(&self) -> Result<WorkoutSession, SessionError>;
    async fn get_active_session(&self) -> Result<Option<WorkoutSession>, ReadError>;
    /// Writes the edited session through to the active-session slot.
    async fn update_active_session(&self, session: WorkoutSession) -> Result<(), UpdateError>;
    /// Persists the active session as an immutable workout, optionally
    /// rewriting the routine template to match the session's final
    /// exercise list, and clears the slot.
    async fn finish_session(&self, update_template: bool) -> Result<Workout, SessionError>;
    /// Clears the active-session slot without writing anything.
    async fn discard_session(&self) -> Result<(), UpdateError>;
}

/// Single-slot store for the one in-progress session. Starting a new
/// session overwrites whatever was there; every edit during a workout is
/// written through so a reload never loses in-progress set data.
#[allow(async_fn_in_trait)]
pub trait SessionRepository {
    async fn read_active_session(&self) -> Result<Option<WorkoutSession>, ReadError>;
    async fn write_active_session(
        &self,
        session: Option<WorkoutSession>,
    ) -> Result<(), UpdateError>;
}

/// An editable in-progress workout, projected from a routine template and
/// prior history. Serialized as the active-session snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    pub id: SessionID,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub routine_id: Option<RoutineID>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub routine_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tags: Option<Vec<String>>,
    /// Exercise ids as they stood when the session was started, used to
    /// detect divergence from the routine template.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_exercise_ids: Option<Vec<ExerciseID>>,
    pub exercises: Vec<SessionExercise>,
}

#[derive(
    Deref, Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct SessionID(Uuid);

impl SessionID {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for SessionID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for SessionID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionExercise {
    pub exercise_id: ExerciseID,
    pub name: String,
    pub metric_type: MetricType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rest_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_sets: Option<Vec<PreviousSet>>,
    pub sets: Vec<SessionSet>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct SessionSet {
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
    #[serde(default)]
    pub completed: bool,
}

/// Historical performance of one set, shown next to the current set.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct PreviousSet {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reps: Option<u32>,
}

impl From<&WorkoutSet> for PreviousSet {
    fn from(set: &WorkoutSet) -> Self {
        Self {
            weight: set.weight,
            reps: set.reps,
        }
    }
}

/// The set values a metric kind admits, derived from stored defaults. A
/// time exercise never carries weight or distance prefills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetPrescription {
    WeightReps {
        weight: Option<f64>,
        reps: Option<u32>,
    },
    Reps {
        reps: Option<u32>,
    },
    Time {
        duration: Option<u32>,
    },
    Distance {
        distance: Option<f64>,
    },
}

impl SetPrescription {
    #[must_use]
    pub fn from_defaults(metric: MetricType, defaults: &ExerciseDefaults) -> Self {
        match metric {
            MetricType::WeightReps => Self::WeightReps {
                weight: defaults.weight,
                reps: defaults.reps,
            },
            MetricType::Reps => Self::Reps {
                reps: defaults.reps,
            },
            MetricType::Time => Self::Time {
                duration: defaults.duration,
            },
            MetricType::Distance => Self::Distance {
                distance: defaults.distance,
            },
        }
    }

    #[must_use]
    pub fn to_set(self) -> SessionSet {
        match self {
            Self::WeightReps { weight, reps } => SessionSet {
                weight,
                reps,
                ..SessionSet::default()
            },
            Self::Reps { reps } => SessionSet {
                reps,
                ..SessionSet::default()
            },
            Self::Time { duration } => SessionSet {
                duration,
                ..SessionSet::default()
            },
            Self::Distance { distance } => SessionSet {
                distance,
                ..SessionSet::default()
            },
        }
    }
}

/// Synthesizes the initial sets for one routine exercise: the default set
/// count (3 when absent), each pre-filled from the defaults the metric
/// kind admits, all incomplete.
#[must_use]
pub fn plan_sets(metric: MetricType, defaults: Option<&ExerciseDefaults>) -> Vec<SessionSet> {
    let defaults = defaults.cloned().unwrap_or_default();
    let count = defaults.sets.unwrap_or(3);
    let prescription = SetPrescription::from_defaults(metric, &defaults);
    (0..count).map(|_| prescription.to_set()).collect()
}

/// Pairs each current set with the closest unmatched historical set.
///
/// Greedy, in current-set order: the cost of a candidate is the weight
/// difference doubled (flat 5 when exactly one side has a weight), plus the
/// reps difference (flat 3 on one-sided absence), plus 0.25 per index of
/// positional distance so order-stable matches win ties. Each historical
/// set is used at most once; no backtracking, ties favor the
/// earliest-scanned candidate. Deliberately a heuristic rather than an
/// optimal assignment.
#[must_use]
pub fn match_previous(previous: &[PreviousSet], current: &[SessionSet]) -> Vec<Option<PreviousSet>> {
    let mut taken = vec![false; previous.len()];
    current
        .iter()
        .enumerate()
        .map(|(i, set)| {
            let mut best: Option<(usize, f64)> = None;
            for (j, candidate) in previous.iter().enumerate() {
                if taken[j] {
                    continue;
                }
                let cost = match_cost(set, candidate, i.abs_diff(j));
                if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                    best = Some((j, cost));
                }
            }
            best.map(|(j, _)| {
                taken[j] = true;
                previous[j]
            })
        })
        .collect()
}

fn match_cost(current: &SessionSet, previous: &PreviousSet, index_distance: usize) -> f64 {
    let weight_cost = match (current.weight, previous.weight) {
        (Some(a), Some(b)) => (a - b).abs() * 2.0,
        (None, None) => 0.0,
        _ => 5.0,
    };
    let reps_cost = match (current.reps, previous.reps) {
        (Some(a), Some(b)) => f64::from(a.abs_diff(b)),
        (None, None) => 0.0,
        _ => 3.0,
    };
    #[allow(clippy::cast_precision_loss)]
    let position_cost = index_distance as f64 * 0.25;
    weight_cost + reps_cost + position_cost
}

impl WorkoutSession {
    /// Whether the session's exercise list no longer matches the routine
    /// template it was started from.
    #[must_use]
    pub fn template_diverged(&self) -> bool {
        let Some(original) = &self.original_exercise_ids else {
            return false;
        };
        let current: Vec<ExerciseID> = self.exercises.iter().map(|e| e.exercise_id).collect();
        current != *original
    }

    /// Converts the session into a persistable workout, dropping sets that
    /// were never completed. Exercises are kept even when all of their
    /// sets are dropped.
    #[must_use]
    pub fn into_workout(self, ended_at: DateTime<Utc>) -> NewWorkout {
        NewWorkout {
            routine_id: self.routine_id,
            routine_name: self.routine_name,
            tags: self.tags.unwrap_or_default(),
            started_at: self.created_at,
            ended_at,
            exercises: self
                .exercises
                .into_iter()
                .map(|exercise| NewWorkoutExercise {
                    exercise_id: exercise.exercise_id,
                    name: exercise.name,
                    sets: exercise
                        .sets
                        .iter()
                        .filter(|s| s.completed)
                        .enumerate()
                        .map(|(position, s)| WorkoutSet {
                            #[allow(clippy::cast_possible_truncation)]
                            position: position as u32,
                            weight: s.weight,
                            reps: s.reps,
                            duration: s.duration,
                            distance: s.distance,
                            rpe: s.rpe,
                            completed: true,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Derives the defaults to store back on the routine template after a
/// session whose exercise list diverged: the session's final set count
/// plus the last set's values for the fields the metric kind admits.
#[must_use]
pub fn infer_defaults(exercise: &SessionExercise) -> ExerciseDefaults {
    #[allow(clippy::cast_possible_truncation)]
    let sets = Some(exercise.sets.len() as u32);
    let last = exercise.sets.last();
    let mut defaults = ExerciseDefaults {
        sets,
        rest_seconds: exercise.rest_seconds,
        ..ExerciseDefaults::default()
    };
    if let Some(last) = last {
        match exercise.metric_type {
            MetricType::WeightReps => {
                defaults.weight = last.weight;
                defaults.reps = last.reps;
            }
            MetricType::Reps => defaults.reps = last.reps,
            MetricType::Time => defaults.duration = last.duration,
            MetricType::Distance => defaults.distance = last.distance,
        }
    }
    defaults
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn weight_reps(weight: f64, reps: u32) -> SessionSet {
        SessionSet {
            weight: Some(weight),
            reps: Some(reps),
            ..SessionSet::default()
        }
    }

    fn previous(weight: f64, reps: u32) -> PreviousSet {
        PreviousSet {
            weight: Some(weight),
            reps: Some(reps),
        }
    }

    #[test]
    fn test_match_previous_prefers_closer_weight_without_reuse() {
        let history = [previous(80.0, 8), previous(85.0, 5)];
        let current = [weight_reps(85.0, 5), weight_reps(80.0, 8)];

        let matches = match_previous(&history, &current);

        assert_eq!(matches, vec![Some(history[1]), Some(history[0])]);
    }

    #[test]
    fn test_match_previous_exhausted_candidates_yield_none() {
        let history = [previous(60.0, 10)];
        let current = [weight_reps(60.0, 10), weight_reps(60.0, 10)];

        let matches = match_previous(&history, &current);

        assert_eq!(matches, vec![Some(history[0]), None]);
    }

    #[test]
    fn test_match_previous_ties_favor_order_stability() {
        // Identical candidates: the positional penalty picks index 0 for
        // the first current set and index 1 for the second.
        let history = [previous(100.0, 5), previous(100.0, 5)];
        let current = [weight_reps(100.0, 5), weight_reps(100.0, 5)];

        let matches = match_previous(&history, &current);

        assert_eq!(matches, vec![Some(history[0]), Some(history[1])]);
    }

    #[test]
    fn test_match_previous_one_sided_weight_penalty() {
        // A flat 5 for the missing weight beats a 6-point weight gap only
        // when the gap is larger; here 3.0 kg apart (cost 6) loses to the
        // weightless candidate (cost 5 + reps 0 + position 0.25).
        let history = [
            previous(63.0, 8),
            PreviousSet {
                weight: None,
                reps: Some(8),
            },
        ];
        let current = [weight_reps(60.0, 8)];

        let matches = match_previous(&history, &current);

        assert_eq!(matches, vec![Some(history[1])]);
    }

    #[test]
    fn test_match_previous_empty_history() {
        assert_eq!(
            match_previous(&[], &[weight_reps(50.0, 10)]),
            vec![None]
        );
    }

    #[rstest]
    #[case(MetricType::WeightReps, Some(4), 4)]
    #[case(MetricType::WeightReps, None, 3)]
    #[case(MetricType::Time, None, 3)]
    fn test_plan_sets_count(
        #[case] metric: MetricType,
        #[case] default_sets: Option<u32>,
        #[case] expected: usize,
    ) {
        let defaults = ExerciseDefaults {
            sets: default_sets,
            ..ExerciseDefaults::default()
        };
        assert_eq!(plan_sets(metric, Some(&defaults)).len(), expected);
    }

    #[test]
    fn test_plan_sets_gates_fields_by_metric() {
        let defaults = ExerciseDefaults {
            weight: Some(60.0),
            reps: Some(8),
            duration: Some(45),
            distance: Some(1.5),
            ..ExerciseDefaults::default()
        };

        let weight_sets = plan_sets(MetricType::WeightReps, Some(&defaults));
        assert_eq!(weight_sets[0].weight, Some(60.0));
        assert_eq!(weight_sets[0].reps, Some(8));
        assert_eq!(weight_sets[0].duration, None);
        assert_eq!(weight_sets[0].distance, None);
        assert!(!weight_sets[0].completed);

        let time_sets = plan_sets(MetricType::Time, Some(&defaults));
        assert_eq!(time_sets[0].duration, Some(45));
        assert_eq!(time_sets[0].weight, None);

        let distance_sets = plan_sets(MetricType::Distance, Some(&defaults));
        assert_eq!(distance_sets[0].distance, Some(1.5));
        assert_eq!(distance_sets[0].reps, None);
    }

    fn session(exercises: Vec<SessionExercise>) -> WorkoutSession {
        WorkoutSession {
            id: 1.into(),
            created_at: DateTime::UNIX_EPOCH,
            routine_id: Some(2.into()),
            routine_name: Some("Empuje".to_string()),
            tags: Some(vec!["lunes".to_string()]),
            original_exercise_ids: Some(exercises.iter().map(|e| e.exercise_id).collect()),
            exercises,
        }
    }

    fn session_exercise(exercise_id: u128, sets: Vec<SessionSet>) -> SessionExercise {
        SessionExercise {
            exercise_id: exercise_id.into(),
            name: format!("Exercise {exercise_id}"),
            metric_type: MetricType::WeightReps,
            rest_seconds: None,
            previous_sets: None,
            sets,
        }
    }

    #[test]
    fn test_into_workout_strips_incomplete_sets_keeps_empty_exercises() {
        let completed = SessionSet {
            completed: true,
            ..weight_reps(60.0, 8)
        };
        let session = session(vec![
            session_exercise(1, vec![completed.clone(), weight_reps(60.0, 8), completed]),
            session_exercise(2, vec![weight_reps(40.0, 12)]),
        ]);

        let workout = session.into_workout(DateTime::UNIX_EPOCH);

        assert_eq!(workout.exercises.len(), 2);
        assert_eq!(workout.exercises[0].sets.len(), 2);
        assert_eq!(
            workout.exercises[0]
                .sets
                .iter()
                .map(|s| s.position)
                .collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!(workout.exercises[1].sets.is_empty());
        assert_eq!(workout.routine_name, Some("Empuje".to_string()));
    }

    #[test]
    fn test_into_workout_keeps_completed_sets_without_values() {
        // A time exercise without stored defaults prefills nothing; a set
        // marked done with no value typed in is still a recorded set.
        let mut sets = plan_sets(MetricType::Time, None);
        sets[0].completed = true;
        sets[1].completed = true;
        let session = session(vec![SessionExercise {
            metric_type: MetricType::Time,
            ..session_exercise(1, sets)
        }]);

        let workout = session.into_workout(DateTime::UNIX_EPOCH);

        assert_eq!(workout.exercises[0].sets.len(), 2);
        assert_eq!(workout.exercises[0].sets[0].duration, None);
        assert!(workout.exercises[0].sets[0].completed);
    }

    #[test]
    fn test_template_diverged() {
        let unchanged = session(vec![session_exercise(1, vec![])]);
        assert!(!unchanged.template_diverged());

        let mut reordered = session(vec![
            session_exercise(1, vec![]),
            session_exercise(2, vec![]),
        ]);
        reordered.exercises.swap(0, 1);
        assert!(reordered.template_diverged());

        let mut grown = session(vec![session_exercise(1, vec![])]);
        grown.exercises.push(session_exercise(3, vec![]));
        assert!(grown.template_diverged());
    }

    #[test]
    fn test_infer_defaults_from_final_sets() {
        let exercise = SessionExercise {
            rest_seconds: Some(90),
            ..session_exercise(1, vec![weight_reps(60.0, 8), weight_reps(62.5, 6)])
        };

        let defaults = infer_defaults(&exercise);

        assert_eq!(defaults.sets, Some(2));
        assert_eq!(defaults.weight, Some(62.5));
        assert_eq!(defaults.reps, Some(6));
        assert_eq!(defaults.rest_seconds, Some(90));
        assert_eq!(defaults.duration, None);
    }

    #[test]
    fn test_session_snapshot_round_trip() {
        let session = session(vec![session_exercise(
            1,
            vec![SessionSet {
                rpe: Some(Rpe::new(8).unwrap()),
                completed: true,
                ..weight_reps(60.0, 8)
            }],
        )]);

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"routineId\""));
        assert!(json.contains("\"originalExerciseIds\""));
        assert!(json.contains("\"exerciseId\""));
        assert!(json.contains("\"metricType\":\"weight_reps\""));

        let decoded: WorkoutSession = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, session);
    }
}
