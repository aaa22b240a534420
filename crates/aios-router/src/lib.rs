//! AIOS Router - task complexity classification
//!
//! Scores a task description and its metadata into a complexity level so
//! callers can pick a routing or orchestration policy.
//!
//! ## Quick Start
//!
//! ```rust
//! use aios_router::{ComplexityLevel, TaskComplexityClassifier, TaskDescriptor};
//!
//! let classifier = TaskComplexityClassifier::new();
//! let result = classifier.classify(&TaskDescriptor::new("Fix typo in readme"));
//!
//! assert_eq!(result.level, ComplexityLevel::Simple);
//! assert!((0.0..=1.0).contains(&result.confidence));
//! ```

pub mod classifier;
pub mod config;

pub use classifier::{
    ComplexityLevel, ComplexityResult, CountAffinity, IndicatorSet, LevelScores,
    TaskComplexityClassifier, TaskDescriptor,
};
pub use config::ClassifierConfig;
