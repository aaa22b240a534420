//! Classifier thresholds

use serde::{Deserialize, Serialize};

/// Advisory thresholds. They shape the confidence signal but never change
/// which level wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Below this top score the classification is considered weak
    pub simple_threshold: f64,
    /// A complex verdict below this score is considered tentative
    pub complex_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            simple_threshold: 0.3,
            complex_threshold: 0.7,
        }
    }
}

impl ClassifierConfig {
    pub fn new(simple_threshold: f64, complex_threshold: f64) -> Self {
        Self {
            simple_threshold: simple_threshold.clamp(0.0, 1.0),
            complex_threshold: complex_threshold.clamp(0.0, 1.0),
        }
    }
}
