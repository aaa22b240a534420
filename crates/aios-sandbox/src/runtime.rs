//! The bounded-execution capability consumed by helpers and validators
//!
//! A [`BoundedRuntime`] hands out single-use [`BoundedContext`]s. A context is
//! created with a memory ceiling, runs exactly one snippet against a copy of
//! its arguments under a hard deadline, and is dropped afterwards. `run`
//! takes the context by value, so reusing one across calls does not compile.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a bounded run did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeFault {
    /// Hard deadline reached
    #[error("timed out")]
    Timeout,
    /// Memory ceiling reached
    #[error("memory limit exceeded")]
    MemoryExceeded,
    /// The snippet could not be compiled or linked
    #[error("compile error: {0}")]
    Compile(String),
    /// The snippet trapped or reported a fault while running
    #[error("{0}")]
    Trap(String),
}

/// Factory for isolated, single-use execution contexts.
///
/// Implementations can wrap any isolation primitive (embedded interpreter,
/// WebAssembly engine, subprocess) as long as each context has its own
/// memory ceiling, the deadline is enforced, and arguments and results cross
/// the boundary by copy.
pub trait BoundedRuntime: Send + Sync + fmt::Debug {
    /// Runtime identifier reported in helper metadata
    fn name(&self) -> &str;

    /// Create a fresh context whose memory is capped at `memory_bytes`
    fn create_context(
        &self,
        memory_bytes: usize,
    ) -> Result<Box<dyn BoundedContext>, RuntimeFault>;
}

/// One isolated execution. Dropping it releases every resource it holds.
#[async_trait]
pub trait BoundedContext: Send {
    /// Compile and run `code` against `args`, returning a copy of its result
    async fn run(
        self: Box<Self>,
        code: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<Value, RuntimeFault>;
}
