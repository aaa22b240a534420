//! # AIOS Parallel
//!
//! Runs the same task on two providers at once and reduces the outcomes.
//!
//! | Mode | Waits for | Delivers |
//! |------|-----------|----------|
//! | `race` | first success | that output |
//! | `consensus` | both | primary output plus similarity and agreement |
//! | `best-of` | both | the higher scoring output |
//! | `merge` | both | both outputs under labeled headings |
//! | `fallback` | primary, then secondary if needed | first usable output |
//!
//! ## Quick Start
//!
//! ```rust
//! use aios_parallel::{
//!     ParallelConfig, ParallelExecutor, ParallelMode, ProviderError, ProviderResponse,
//! };
//!
//! # tokio_test::block_on(async {
//! let executor = ParallelExecutor::with_config(
//!     ParallelConfig::default().with_mode(ParallelMode::Merge),
//! );
//!
//! let result = executor
//!     .execute(
//!         || async { Ok::<_, ProviderError>(ProviderResponse::ok("left")) },
//!         || async { Ok::<_, ProviderError>(ProviderResponse::ok("right")) },
//!     )
//!     .await;
//!
//! assert!(result.success);
//! assert_eq!(result.output.unwrap(), "## primary\n\nleft\n\n## secondary\n\nright");
//! # });
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod mode;
pub mod provider;
pub mod recommend;
pub mod similarity;
pub mod stats;

pub use config::{ConfigError, ParallelConfig};
pub use error::ParallelError;
pub use events::ParallelEvent;
pub use executor::{
    BestOfScores, BranchFailure, ParallelExecutor, ParallelResult, ProviderOutcome,
};
pub use mode::{ParallelMode, UnknownMode};
pub use provider::{ProviderError, ProviderResponse};
pub use recommend::recommend_mode;
pub use similarity::{jaccard_similarity, quality_score};
pub use stats::{ParallelStats, StatsSnapshot};
