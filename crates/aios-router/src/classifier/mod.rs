//! Task Complexity Classifier - keyword and metadata scoring
//!
//! Every level has an [`IndicatorSet`]: keywords whose presence in the
//! description pushes toward the level, and weights for the number of files
//! and acceptance criteria. The best-scoring level wins; the gap to the
//! runner-up becomes the confidence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::ClassifierConfig;

/// Distinct keyword hits needed for full keyword density
const KEYWORD_SATURATION: f64 = 2.0;

/// File or criteria count at which the count signal saturates
const COUNT_SATURATION: f64 = 8.0;

/// Gap between the top two scores that maps to full confidence
const CONFIDENT_GAP: f64 = 0.5;

const BLANK_DESCRIPTION_DAMPING: f64 = 0.25;
const WEAK_SCORE_DAMPING: f64 = 0.5;
const TENTATIVE_COMPLEX_DAMPING: f64 = 0.75;

const SIMPLE_KEYWORDS: &[&str] = &[
    "format", "typo", "rename", "fix", "update", "comment", "readme", "doc", "style", "lint",
    "bump", "minor",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "implement", "add", "feature", "refactor", "integrate", "endpoint", "test", "component",
    "api", "authentication", "module", "service", "migrate", "validation",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "architecture", "design", "security", "performance", "optimization", "optimize",
    "distributed", "scalability", "concurrency", "system", "infrastructure", "redesign",
];

/// Complexity level, ordered from least to most complex
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    Medium,
    Complex,
}

impl ComplexityLevel {
    /// All levels, least complex first
    pub const ALL: [ComplexityLevel; 3] = [Self::Simple, Self::Medium, Self::Complex];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a level responds to a normalized count signal `s` in [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountAffinity {
    /// Prefers few items: `1 - s`
    Low,
    /// Prefers a moderate number: peaks at `s = 0.5`
    Mid,
    /// Prefers many items: `s`
    High,
}

impl CountAffinity {
    pub fn apply(self, s: f64) -> f64 {
        let s = s.clamp(0.0, 1.0);
        match self {
            Self::Low => 1.0 - s,
            Self::Mid => 1.0 - (2.0 * s - 1.0).abs(),
            Self::High => s,
        }
    }
}

/// Scoring configuration for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    /// Lowercase keyword stems; a description word matches when it starts with one
    pub keywords: Vec<String>,
    pub keyword_weight: f64,
    pub file_weight: f64,
    pub criteria_weight: f64,
    pub count_affinity: CountAffinity,
}

impl IndicatorSet {
    /// Built-in indicators for `level`
    pub fn defaults_for(level: ComplexityLevel) -> Self {
        let (keywords, count_affinity) = match level {
            ComplexityLevel::Simple => (SIMPLE_KEYWORDS, CountAffinity::Low),
            ComplexityLevel::Medium => (MEDIUM_KEYWORDS, CountAffinity::Mid),
            ComplexityLevel::Complex => (COMPLEX_KEYWORDS, CountAffinity::High),
        };
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            keyword_weight: 0.6,
            file_weight: 0.2,
            criteria_weight: 0.2,
            count_affinity,
        }
    }

    /// Fraction of saturation reached by distinct keyword hits
    fn keyword_density(&self, words: &[String]) -> f64 {
        let hits = self
            .keywords
            .iter()
            .filter(|keyword| words.iter().any(|word| word.starts_with(keyword.as_str())))
            .collect::<HashSet<_>>()
            .len();
        (hits as f64 / KEYWORD_SATURATION).min(1.0)
    }

    fn score(&self, words: &[String], files: f64, criteria: f64) -> f64 {
        let score = self.keyword_weight * self.keyword_density(words)
            + self.file_weight * self.count_affinity.apply(files)
            + self.criteria_weight * self.count_affinity.apply(criteria);
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// The task being classified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDescriptor {
    pub description: String,
    pub files: Vec<String>,
    #[serde(alias = "acceptanceCriteria")]
    pub acceptance_criteria: Vec<String>,
}

impl TaskDescriptor {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }
}

/// Per-level scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelScores {
    pub simple: f64,
    pub medium: f64,
    pub complex: f64,
}

impl LevelScores {
    pub fn get(&self, level: ComplexityLevel) -> f64 {
        match level {
            ComplexityLevel::Simple => self.simple,
            ComplexityLevel::Medium => self.medium,
            ComplexityLevel::Complex => self.complex,
        }
    }
}

/// Classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityResult {
    pub level: ComplexityLevel,
    /// Score of the winning level
    pub score: f64,
    pub scores: LevelScores,
    /// How clearly the winner beat the runner-up, in [0,1]
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct TaskComplexityClassifier {
    config: ClassifierConfig,
    indicators: [IndicatorSet; 3],
}

impl TaskComplexityClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self {
            config,
            indicators: ComplexityLevel::ALL.map(IndicatorSet::defaults_for),
        }
    }

    /// Swap the indicator set of one level
    pub fn with_indicators(mut self, level: ComplexityLevel, set: IndicatorSet) -> Self {
        self.indicators[level.index()] = set;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn indicators(&self, level: ComplexityLevel) -> &IndicatorSet {
        &self.indicators[level.index()]
    }

    pub fn classify(&self, task: &TaskDescriptor) -> ComplexityResult {
        let words = tokenize(&task.description);
        let files = (task.files.len() as f64 / COUNT_SATURATION).min(1.0);
        let criteria = (task.acceptance_criteria.len() as f64 / COUNT_SATURATION).min(1.0);

        let score_of =
            |level: ComplexityLevel| self.indicators(level).score(&words, files, criteria);
        let scores = LevelScores {
            simple: score_of(ComplexityLevel::Simple),
            medium: score_of(ComplexityLevel::Medium),
            complex: score_of(ComplexityLevel::Complex),
        };

        // most complex first, so a tie keeps the higher level
        let mut ranked = ComplexityLevel::ALL;
        ranked.reverse();
        ranked.sort_by(|a, b| scores.get(*b).total_cmp(&scores.get(*a)));

        let level = ranked[0];
        let score = scores.get(level);
        let gap = score - scores.get(ranked[1]);

        let mut confidence = (gap / CONFIDENT_GAP).min(1.0);
        if words.is_empty() {
            confidence *= BLANK_DESCRIPTION_DAMPING;
        }
        if score < self.config.simple_threshold {
            confidence *= WEAK_SCORE_DAMPING;
        }
        if level == ComplexityLevel::Complex && score < self.config.complex_threshold {
            confidence *= TENTATIVE_COMPLEX_DAMPING;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        tracing::debug!(%level, score, confidence, "Classified task");

        ComplexityResult {
            level,
            score,
            scores,
            confidence,
        }
    }
}

impl Default for TaskComplexityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}
