use chrono::{DateTime, Utc};

use crate::{Exercise, ExerciseSource, ExerciseTranslation, MetricType, Name};

/// A bundled catalog entry. Ids are fixed so that backups created on one
/// device can reference seeded exercises by id on another.
pub struct SeedExercise {
    pub id: u128,
    pub base_name: &'static str,
    pub muscles: &'static [&'static str],
    pub equipment: &'static [&'static str],
    pub metric: MetricType,
    pub translations: &'static [(&'static str, &'static str)],
}

pub static EXERCISES: &[SeedExercise] = &[
    SeedExercise {
        id: 0x0001,
        base_name: "Bench Press",
        muscles: &["Pectoralis major", "Triceps brachii", "Anterior deltoid"],
        equipment: &["Barbell", "Bench"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Press de Banca"), ("en", "Bench Press")],
    },
    SeedExercise {
        id: 0x0002,
        base_name: "Incline Dumbbell Press",
        muscles: &["Pectoralis major", "Anterior deltoid"],
        equipment: &["Dumbbell", "Incline bench"],
        metric: MetricType::WeightReps,
        translations: &[
            ("es", "Press Inclinado con Mancuernas"),
            ("en", "Incline Dumbbell Press"),
        ],
    },
    SeedExercise {
        id: 0x0003,
        base_name: "Overhead Press",
        muscles: &["Anterior deltoid", "Triceps brachii"],
        equipment: &["Barbell"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Press Militar"), ("en", "Overhead Press")],
    },
    SeedExercise {
        id: 0x0004,
        base_name: "Lateral Raise",
        muscles: &["Anterior deltoid"],
        equipment: &["Dumbbell"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Elevaciones Laterales"), ("en", "Lateral Raise")],
    },
    SeedExercise {
        id: 0x0005,
        base_name: "Squat",
        muscles: &["Quadriceps femoris", "Gluteus maximus"],
        equipment: &["Barbell", "Rack"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Sentadilla"), ("en", "Squat")],
    },
    SeedExercise {
        id: 0x0006,
        base_name: "Bulgarian Split Squat",
        muscles: &["Quadriceps femoris", "Gluteus maximus"],
        equipment: &["Dumbbell", "Bench"],
        metric: MetricType::WeightReps,
        translations: &[
            ("es", "Sentadilla Búlgara"),
            ("en", "Bulgarian Split Squat"),
        ],
    },
    SeedExercise {
        id: 0x0007,
        base_name: "Deadlift",
        muscles: &["Gluteus maximus", "Biceps femoris", "Trapezius"],
        equipment: &["Barbell"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Peso Muerto"), ("en", "Deadlift")],
    },
    SeedExercise {
        id: 0x0008,
        base_name: "Romanian Deadlift",
        muscles: &["Biceps femoris", "Gluteus maximus"],
        equipment: &["Barbell"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Peso Muerto Rumano"), ("en", "Romanian Deadlift")],
    },
    SeedExercise {
        id: 0x0009,
        base_name: "Barbell Row",
        muscles: &["Latissimus dorsi", "Trapezius", "Biceps brachii"],
        equipment: &["Barbell"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Remo con Barra"), ("en", "Barbell Row")],
    },
    SeedExercise {
        id: 0x000a,
        base_name: "Lat Pulldown",
        muscles: &["Latissimus dorsi", "Biceps brachii"],
        equipment: &["Cable machine"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Jalón al Pecho"), ("en", "Lat Pulldown")],
    },
    SeedExercise {
        id: 0x000b,
        base_name: "Pull-up",
        muscles: &["Latissimus dorsi", "Biceps brachii"],
        equipment: &["Pull-up bar"],
        metric: MetricType::Reps,
        translations: &[("es", "Dominadas"), ("en", "Pull-up")],
    },
    SeedExercise {
        id: 0x000c,
        base_name: "Push-up",
        muscles: &["Pectoralis major", "Triceps brachii"],
        equipment: &[],
        metric: MetricType::Reps,
        translations: &[("es", "Flexiones"), ("en", "Push-up")],
    },
    SeedExercise {
        id: 0x000d,
        base_name: "Dip",
        muscles: &["Pectoralis major", "Triceps brachii"],
        equipment: &["Dip bars"],
        metric: MetricType::Reps,
        translations: &[("es", "Fondos"), ("en", "Dip")],
    },
    SeedExercise {
        id: 0x000e,
        base_name: "Biceps Curl",
        muscles: &["Biceps brachii", "Brachialis"],
        equipment: &["Dumbbell"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Curl de Bíceps"), ("en", "Biceps Curl")],
    },
    SeedExercise {
        id: 0x000f,
        base_name: "French Press",
        muscles: &["Triceps brachii"],
        equipment: &["Barbell", "Bench"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Press Francés"), ("en", "French Press")],
    },
    SeedExercise {
        id: 0x0010,
        base_name: "Leg Press",
        muscles: &["Quadriceps femoris", "Gluteus maximus"],
        equipment: &["Leg press machine"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Prensa de Piernas"), ("en", "Leg Press")],
    },
    SeedExercise {
        id: 0x0011,
        base_name: "Leg Curl",
        muscles: &["Biceps femoris"],
        equipment: &["Leg curl machine"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Curl Femoral"), ("en", "Leg Curl")],
    },
    SeedExercise {
        id: 0x0012,
        base_name: "Calf Raise",
        muscles: &["Gastrocnemius", "Soleus"],
        equipment: &["Machine"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Elevación de Talones"), ("en", "Calf Raise")],
    },
    SeedExercise {
        id: 0x0013,
        base_name: "Hip Thrust",
        muscles: &["Gluteus maximus"],
        equipment: &["Barbell", "Bench"],
        metric: MetricType::WeightReps,
        translations: &[("es", "Empuje de Cadera"), ("en", "Hip Thrust")],
    },
    SeedExercise {
        id: 0x0014,
        base_name: "Crunch",
        muscles: &["Rectus abdominis"],
        equipment: &[],
        metric: MetricType::Reps,
        translations: &[("es", "Abdominales"), ("en", "Crunch")],
    },
    SeedExercise {
        id: 0x0015,
        base_name: "Russian Twist",
        muscles: &["Obliquus externus abdominis"],
        equipment: &[],
        metric: MetricType::Reps,
        translations: &[("es", "Giro Ruso"), ("en", "Russian Twist")],
    },
    SeedExercise {
        id: 0x0016,
        base_name: "Plank",
        muscles: &["Rectus abdominis", "Obliquus externus abdominis"],
        equipment: &[],
        metric: MetricType::Time,
        translations: &[("es", "Plancha"), ("en", "Plank")],
    },
    SeedExercise {
        id: 0x0017,
        base_name: "Wall Sit",
        muscles: &["Quadriceps femoris"],
        equipment: &[],
        metric: MetricType::Time,
        translations: &[("es", "Sentadilla Isométrica"), ("en", "Wall Sit")],
    },
    SeedExercise {
        id: 0x0018,
        base_name: "Running",
        muscles: &["Quadriceps femoris", "Gastrocnemius"],
        equipment: &[],
        metric: MetricType::Distance,
        translations: &[("es", "Carrera"), ("en", "Running")],
    },
    SeedExercise {
        id: 0x0019,
        base_name: "Rowing Machine",
        muscles: &["Latissimus dorsi", "Quadriceps femoris"],
        equipment: &["Rowing machine"],
        metric: MetricType::Distance,
        translations: &[("es", "Remo en Máquina"), ("en", "Rowing Machine")],
    },
];

/// Materializes the bundled catalog for seeding.
///
/// # Panics
///
/// Panics if a catalog entry carries an invalid base name. The catalog is
/// static data covered by tests, so this cannot happen at runtime.
#[must_use]
pub fn seed_records(created_at: DateTime<Utc>) -> Vec<(Exercise, Vec<ExerciseTranslation>)> {
    EXERCISES
        .iter()
        .map(|seed| {
            let id = seed.id.into();
            let exercise = Exercise {
                id,
                name: Name::new(seed.base_name).expect("valid catalog name"),
                muscles: seed.muscles.iter().map(ToString::to_string).collect(),
                equipment: seed.equipment.iter().map(ToString::to_string).collect(),
                metric: seed.metric,
                custom: false,
                source: ExerciseSource::Seeded,
                created_at,
            };
            let translations = seed
                .translations
                .iter()
                .map(|(language, name)| ExerciseTranslation {
                    exercise_id: id,
                    language: (*language).to_string(),
                    name: (*name).to_string(),
                })
                .collect();
            (exercise, translations)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::normalize_name;

    #[test]
    fn test_seed_ids_unique_and_nonzero() {
        let ids: HashSet<u128> = EXERCISES.iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), EXERCISES.len());
        assert!(!ids.contains(&0));
    }

    #[test]
    fn test_seed_normalized_names_unique() {
        let names: HashSet<String> = EXERCISES
            .iter()
            .map(|e| normalize_name(e.base_name))
            .collect();
        assert_eq!(names.len(), EXERCISES.len());
    }

    #[test]
    fn test_seed_translations_cover_spanish_and_english() {
        for seed in EXERCISES {
            let languages: Vec<&str> = seed.translations.iter().map(|(l, _)| *l).collect();
            assert!(languages.contains(&"es"), "{} lacks es", seed.base_name);
            assert!(languages.contains(&"en"), "{} lacks en", seed.base_name);
        }
    }

    #[test]
    fn test_seed_records_are_seeded_and_linked() {
        let records = seed_records(chrono::DateTime::UNIX_EPOCH);
        assert_eq!(records.len(), EXERCISES.len());
        for (exercise, translations) in &records {
            assert!(!exercise.custom);
            assert_eq!(exercise.source, ExerciseSource::Seeded);
            assert!(!exercise.id.is_nil());
            for translation in translations {
                assert_eq!(translation.exercise_id, exercise.id);
            }
        }
    }
}
