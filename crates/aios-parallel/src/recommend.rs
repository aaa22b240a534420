//! Mode recommendation from task complexity

use aios_router::{ComplexityLevel, ComplexityResult};

use crate::mode::ParallelMode;

/// Below this confidence the classification is not trusted
pub const LOW_CONFIDENCE: f64 = 0.3;

/// Pick a combination mode for a classified task.
///
/// Simple tasks race for latency, complex ones ask for consensus; anything
/// uncertain falls back to the conservative default.
pub fn recommend_mode(complexity: &ComplexityResult) -> ParallelMode {
    if complexity.confidence < LOW_CONFIDENCE {
        return ParallelMode::Fallback;
    }
    match complexity.level {
        ComplexityLevel::Simple => ParallelMode::Race,
        ComplexityLevel::Medium => ParallelMode::Fallback,
        ComplexityLevel::Complex => ParallelMode::Consensus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_router::{TaskComplexityClassifier, TaskDescriptor};

    fn classify(task: TaskDescriptor) -> ComplexityResult {
        TaskComplexityClassifier::new().classify(&task)
    }

    #[test]
    fn test_recommendations() {
        let simple = classify(TaskDescriptor::new("Fix typo in readme"));
        assert_eq!(recommend_mode(&simple), ParallelMode::Race);

        let complex = classify(
            TaskDescriptor::new("Redesign distributed system architecture for scalability")
                .with_files((0..8).map(|i| i.to_string()).collect())
                .with_acceptance_criteria((0..8).map(|i| i.to_string()).collect()),
        );
        assert_eq!(recommend_mode(&complex), ParallelMode::Consensus);
    }

    #[test]
    fn test_low_confidence_falls_back() {
        let blank = classify(TaskDescriptor::default());
        assert!(blank.confidence < LOW_CONFIDENCE);
        assert_eq!(recommend_mode(&blank), ParallelMode::Fallback);
    }
}
