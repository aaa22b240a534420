//! Property tests for classifier bounds

use aios_router::{ComplexityLevel, TaskComplexityClassifier, TaskDescriptor};
use proptest::prelude::*;

fn task_strategy() -> impl Strategy<Value = TaskDescriptor> {
    (
        ".{0,120}",
        prop::collection::vec("[a-z/]{1,12}", 0..20),
        prop::collection::vec(".{0,30}", 0..20),
    )
        .prop_map(|(description, files, criteria)| {
            TaskDescriptor::new(description)
                .with_files(files)
                .with_acceptance_criteria(criteria)
        })
}

proptest! {
    #[test]
    fn scores_and_confidence_stay_in_unit_range(task in task_strategy()) {
        let result = TaskComplexityClassifier::new().classify(&task);

        prop_assert!((0.0..=1.0).contains(&result.score));
        prop_assert!((0.0..=1.0).contains(&result.confidence));
        for level in ComplexityLevel::ALL {
            prop_assert!((0.0..=1.0).contains(&result.scores.get(level)));
        }
    }

    #[test]
    fn winner_is_the_argmax(task in task_strategy()) {
        let result = TaskComplexityClassifier::new().classify(&task);

        prop_assert_eq!(result.score, result.scores.get(result.level));
        for level in ComplexityLevel::ALL {
            let other = result.scores.get(level);
            prop_assert!(other <= result.score);
            // ties resolve toward the more complex level
            if other == result.score {
                prop_assert!(level <= result.level);
            }
        }
    }

    #[test]
    fn classification_is_deterministic(task in task_strategy()) {
        let classifier = TaskComplexityClassifier::new();
        prop_assert_eq!(classifier.classify(&task), classifier.classify(&task));
    }
}

#[test]
fn blank_description_never_faults() {
    for description in ["", "   ", "\n\t", "!!!"] {
        let result = TaskComplexityClassifier::new().classify(&TaskDescriptor::new(description));
        assert_eq!(result.level, ComplexityLevel::Simple);
        assert!(result.confidence <= 0.25);
    }
}
