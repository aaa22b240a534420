//! Lifecycle notifications
//!
//! Events go out on a `tokio::sync::broadcast` channel. Sending never
//! blocks and is silently dropped when nobody is subscribed; slow
//! subscribers lag rather than stall the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mode::ParallelMode;

/// Capacity of the event channel
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParallelEvent {
    /// Both provider calls have been launched
    #[serde(rename = "parallel_started")]
    Started {
        execution: Uuid,
        mode: ParallelMode,
        timestamp: DateTime<Utc>,
    },
    /// The execution produced its result
    #[serde(rename = "parallel_completed")]
    Completed {
        execution: Uuid,
        mode: ParallelMode,
        success: bool,
        selected_provider: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ParallelEvent {
    pub fn execution(&self) -> Uuid {
        match self {
            Self::Started { execution, .. } | Self::Completed { execution, .. } => *execution,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "parallel_started",
            Self::Completed { .. } => "parallel_completed",
        }
    }
}
