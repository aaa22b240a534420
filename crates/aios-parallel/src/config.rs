//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::mode::ParallelMode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: String, value: String },
}

/// Settings for a [`ParallelExecutor`](crate::ParallelExecutor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub mode: ParallelMode,
    /// Per-branch deadline; `None` waits indefinitely
    #[serde(with = "opt_millis")]
    pub timeout: Option<Duration>,
    /// Jaccard similarity at or above which consensus is reached
    pub consensus_similarity: f64,
    pub primary_label: String,
    pub secondary_label: String,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            mode: ParallelMode::Fallback,
            timeout: None,
            consensus_similarity: 0.85,
            primary_label: "primary".to_string(),
            secondary_label: "secondary".to_string(),
        }
    }
}

impl ParallelConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(mode) = parse_var::<ParallelMode>("AIOS_PARALLEL_MODE")? {
            config.mode = mode;
        }
        if let Some(ms) = parse_var::<u64>("AIOS_PARALLEL_TIMEOUT_MS")? {
            config.timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(similarity) = parse_var::<f64>("AIOS_CONSENSUS_SIMILARITY")? {
            if !(0.0..=1.0).contains(&similarity) {
                return Err(ConfigError::Invalid {
                    var: "AIOS_CONSENSUS_SIMILARITY".to_string(),
                    value: similarity.to_string(),
                });
            }
            config.consensus_similarity = similarity;
        }

        Ok(config)
    }

    pub fn with_mode(mut self, mode: ParallelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_consensus_similarity(mut self, similarity: f64) -> Self {
        self.consensus_similarity = similarity.clamp(0.0, 1.0);
        self
    }

    /// Names used in results, events and merged output headings
    pub fn with_labels(
        mut self,
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Self {
        self.primary_label = primary.into();
        self.secondary_label = secondary.into();
        self
    }
}

fn parse_var<T: std::str::FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var: var.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
