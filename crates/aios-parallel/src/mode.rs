//! Combination modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the outcomes of the two provider calls are reduced to one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelMode {
    /// First success wins
    Race,
    /// Compare both outputs and report agreement
    Consensus,
    /// Score both outputs, keep the better one
    BestOf,
    /// Concatenate both outputs under labeled headings
    Merge,
    /// Prefer the primary, use the secondary only when the primary fails
    #[default]
    Fallback,
}

impl ParallelMode {
    pub const ALL: [ParallelMode; 5] = [
        Self::Race,
        Self::Consensus,
        Self::BestOf,
        Self::Merge,
        Self::Fallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Race => "race",
            Self::Consensus => "consensus",
            Self::BestOf => "best-of",
            Self::Merge => "merge",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ParallelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown parallel mode '{0}'. Expected one of: race, consensus, best-of, merge, fallback")]
pub struct UnknownMode(pub String);

impl FromStr for ParallelMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}
