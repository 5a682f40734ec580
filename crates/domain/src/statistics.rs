use std::collections::BTreeMap;

use crate::{ExerciseID, ReadError, Workout, WorkoutExercise, WorkoutSet};

#[allow(async_fn_in_trait)]
pub trait StatsService {
    /// Recomputes the aggregated view over the given lookback window; the
    /// settings value is used when no window is given.
    async fn get_training_stats(&self, days: Option<u32>) -> Result<TrainingStats, ReadError>;
}

/// Estimated one-repetition maximum (Epley, divisor 30). A single rep is
/// its own maximum.
#[must_use]
pub fn one_rep_max(weight: f64, reps: u32) -> f64 {
    if reps <= 1 {
        weight
    } else {
        weight * (1.0 + f64::from(reps) / 30.0)
    }
}

/// Per-workout figures shown in the history list.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSummary {
    pub workout: Workout,
    pub duration_minutes: i64,
    /// Σ weight × reps over completed sets.
    pub volume: f64,
    pub total_reps: u64,
    pub total_sets: u64,
}

/// Best estimated 1RM observed for one exercise within the window.
#[derive(Debug, Clone, PartialEq)]
pub struct OneRepMaxRecord {
    pub exercise_id: ExerciseID,
    pub exercise_name: String,
    pub estimated_max: f64,
}

/// Aggregated view over a lookback window. Recomputed from raw history on
/// every request; nothing is cached between calls.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrainingStats {
    /// Newest first.
    pub workouts: Vec<WorkoutSummary>,
    pub total_volume: f64,
    pub total_reps: u64,
    pub total_sets: u64,
    pub total_minutes: i64,
    /// Best estimated 1RM per exercise, descending.
    pub records: Vec<OneRepMaxRecord>,
    /// Set volume split evenly across each exercise's muscle tags.
    pub muscle_volume: BTreeMap<String, f64>,
}

/// Single forward pass over the windowed workouts. Feed workouts newest
/// first; each with its exercises, sets, and the muscle tags of the
/// exercises involved.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    workouts: Vec<WorkoutSummary>,
    total_volume: f64,
    total_reps: u64,
    total_sets: u64,
    total_minutes: i64,
    records: BTreeMap<ExerciseID, OneRepMaxRecord>,
    muscle_volume: BTreeMap<String, f64>,
}

impl StatsAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workout(
        &mut self,
        workout: Workout,
        exercises: &[(WorkoutExercise, Vec<WorkoutSet>)],
        muscles: &BTreeMap<ExerciseID, Vec<String>>,
    ) {
        let mut volume = 0.0;
        let mut reps = 0u64;
        let mut sets = 0u64;

        for (exercise, exercise_sets) in exercises {
            for set in exercise_sets.iter().filter(|s| s.completed) {
                sets += 1;
                reps += u64::from(set.reps.unwrap_or(0));

                let set_volume = set.weight.unwrap_or(0.0) * f64::from(set.reps.unwrap_or(0));
                volume += set_volume;

                if let (Some(weight), Some(set_reps)) = (set.weight, set.reps) {
                    let estimated = one_rep_max(weight, set_reps);
                    self.records
                        .entry(exercise.exercise_id)
                        .and_modify(|record| {
                            if estimated > record.estimated_max {
                                record.estimated_max = estimated;
                            }
                        })
                        .or_insert_with(|| OneRepMaxRecord {
                            exercise_id: exercise.exercise_id,
                            exercise_name: exercise.name.clone(),
                            estimated_max: estimated,
                        });
                }

                if set_volume > 0.0
                    && let Some(tags) = muscles.get(&exercise.exercise_id)
                    && !tags.is_empty()
                {
                    #[allow(clippy::cast_precision_loss)]
                    let share = set_volume / tags.len() as f64;
                    for tag in tags {
                        *self.muscle_volume.entry(tag.clone()).or_insert(0.0) += share;
                    }
                }
            }
        }

        let duration_minutes = workout.duration_minutes();
        self.total_volume += volume;
        self.total_reps += reps;
        self.total_sets += sets;
        self.total_minutes += duration_minutes;
        self.workouts.push(WorkoutSummary {
            workout,
            duration_minutes,
            volume,
            total_reps: reps,
            total_sets: sets,
        });
    }

    #[must_use]
    pub fn finish(self) -> TrainingStats {
        let mut records: Vec<OneRepMaxRecord> = self.records.into_values().collect();
        records.sort_by(|a, b| {
            b.estimated_max
                .partial_cmp(&a.estimated_max)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        TrainingStats {
            workouts: self.workouts,
            total_volume: self.total_volume,
            total_reps: self.total_reps,
            total_sets: self.total_sets,
            total_minutes: self.total_minutes,
            records,
            muscle_volume: self.muscle_volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use chrono::{DateTime, TimeDelta};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(100.0, 1, 100.0)]
    #[case(100.0, 0, 100.0)]
    #[case(80.0, 10, 106.666_666)]
    #[case(60.0, 5, 70.0)]
    fn test_one_rep_max(#[case] weight: f64, #[case] reps: u32, #[case] expected: f64) {
        assert_approx_eq!(one_rep_max(weight, reps), expected, 1e-4);
    }

    fn workout(id: u128, minutes: i64) -> Workout {
        let started_at = DateTime::UNIX_EPOCH;
        Workout {
            id: id.into(),
            routine_id: None,
            routine_name: None,
            tags: vec![],
            started_at,
            ended_at: started_at + TimeDelta::minutes(minutes),
        }
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

    fn workout_exercise(exercise_id: u128, name: &str) -> WorkoutExercise {
        WorkoutExercise {
            id: exercise_id.into(),
            workout_id: 1.into(),
            exercise_id: exercise_id.into(),
            name: name.to_string(),
            position: 0,
        }
    }

    #[test]
    fn test_accumulator_totals_and_records() {
        let mut accumulator = StatsAccumulator::new();
        let muscles = BTreeMap::from([
            (
                ExerciseID::from(1),
                vec!["Pectoralis major".to_string(), "Triceps".to_string()],
            ),
            (ExerciseID::from(2), vec![]),
        ]);

        accumulator.add_workout(
            workout(1, 45),
            &[
                (
                    workout_exercise(1, "Press de Banca"),
                    vec![completed_set(0, 80.0, 10), completed_set(1, 85.0, 5)],
                ),
                (
                    workout_exercise(2, "Plancha"),
                    vec![WorkoutSet {
                        position: 0,
                        duration: Some(60),
                        completed: true,
                        ..WorkoutSet::default()
                    }],
                ),
            ],
            &muscles,
        );

        let stats = accumulator.finish();

        assert_eq!(stats.workouts.len(), 1);
        assert_eq!(stats.total_sets, 3);
        assert_eq!(stats.total_reps, 15);
        assert_eq!(stats.total_minutes, 45);
        assert_approx_eq!(stats.total_volume, 80.0 * 10.0 + 85.0 * 5.0);

        // 1RM record keeps the best set: 80×(1+10/30) ≈ 106.67 beats
        // 85×(1+5/30) ≈ 99.17. The duration-only exercise has no record.
        assert_eq!(stats.records.len(), 1);
        assert_eq!(stats.records[0].exercise_name, "Press de Banca");
        assert_approx_eq!(stats.records[0].estimated_max, 106.666_666, 1e-4);

        // Each set's volume is split evenly over the two muscle tags.
        let half = (80.0 * 10.0 + 85.0 * 5.0) / 2.0;
        assert_approx_eq!(stats.muscle_volume["Pectoralis major"], half);
        assert_approx_eq!(stats.muscle_volume["Triceps"], half);
    }

    #[test]
    fn test_accumulator_skips_incomplete_sets() {
        let mut accumulator = StatsAccumulator::new();
        accumulator.add_workout(
            workout(1, 30),
            &[(
                workout_exercise(1, "Sentadilla"),
                vec![
                    completed_set(0, 100.0, 5),
                    WorkoutSet {
                        position: 1,
                        weight: Some(100.0),
                        reps: Some(5),
                        completed: false,
                        ..WorkoutSet::default()
                    },
                ],
            )],
            &BTreeMap::new(),
        );

        let stats = accumulator.finish();
        assert_eq!(stats.total_sets, 1);
        assert_approx_eq!(stats.total_volume, 500.0);
    }

    #[test]
    fn test_accumulator_clamps_short_workout_duration() {
        let mut accumulator = StatsAccumulator::new();
        accumulator.add_workout(workout(1, 0), &[], &BTreeMap::new());
        let stats = accumulator.finish();
        assert_eq!(stats.total_minutes, 1);
        assert_eq!(stats.workouts[0].duration_minutes, 1);
    }

    #[test]
    fn test_records_sorted_descending() {
        let mut accumulator = StatsAccumulator::new();
        accumulator.add_workout(
            workout(1, 60),
            &[
                (
                    workout_exercise(1, "Curl"),
                    vec![completed_set(0, 20.0, 12)],
                ),
                (
                    workout_exercise(2, "Peso Muerto"),
                    vec![completed_set(0, 140.0, 3)],
                ),
            ],
            &BTreeMap::new(),
        );

        let stats = accumulator.finish();
        assert_eq!(stats.records[0].exercise_name, "Peso Muerto");
        assert_eq!(stats.records[1].exercise_name, "Curl");
    }
}
