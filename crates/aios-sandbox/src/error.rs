//! Structured error types for bounded execution
//!
//! Every failure mode of a helper run has its own variant so callers can tell
//! a sandbox fault apart from a snippet that legitimately returned an
//! error-shaped value.

use thiserror::Error;

/// Error types for helper registration and bounded execution.
///
/// # Example
///
/// ```
/// use aios_sandbox::SandboxError;
///
/// let err = SandboxError::not_found("missing", vec!["double".to_string()]);
/// assert!(err.to_string().contains("double"));
/// ```
#[derive(Debug, Error)]
pub enum SandboxError {
    /// No entry registered under the requested key
    #[error("Helper '{id}' not found. Available helpers: {}", available.join(", "))]
    NotFound {
        /// Requested id
        id: String,
        /// Ids known to the registry at lookup time
        available: Vec<String>,
    },

    /// The definition is unusable (blank id, missing code)
    #[error("Invalid definition for '{id}': {reason}")]
    InvalidDefinition {
        /// Id of the offending definition (may be empty)
        id: String,
        /// Human-readable reason
        reason: String,
    },

    /// Registration collided with an existing key
    #[error("'{id}' already exists. Use replace() to override.")]
    AlreadyRegistered {
        /// Colliding id
        id: String,
    },

    /// The snippet did not finish within its wall-clock budget
    #[error("Helper '{id}' exceeded {timeout_ms}ms timeout")]
    TimeoutExceeded {
        /// Helper id
        id: String,
        /// Hard timeout in milliseconds
        timeout_ms: u64,
    },

    /// The snippet tried to grow past its memory ceiling
    #[error("Helper '{id}' exceeded {limit_bytes} byte memory limit")]
    ResourceExceeded {
        /// Helper id
        id: String,
        /// Memory ceiling in bytes
        limit_bytes: usize,
    },

    /// Any other fault raised while compiling or running the snippet
    #[error("Helper '{id}' execution failed: {message}")]
    ExecutionFault {
        /// Helper id
        id: String,
        /// Inner message from the runtime
        message: String,
    },

    /// A validation came back negative and the caller asked for an error
    #[error("Validation failed for '{command}': {}", errors.join("; "))]
    ValidationFailure {
        /// Validated command
        command: String,
        /// Collected validation errors
        errors: Vec<String>,
    },
}

impl SandboxError {
    /// Create a NotFound error listing the known ids
    pub fn not_found(id: impl Into<String>, available: Vec<String>) -> Self {
        Self::NotFound {
            id: id.into(),
            available,
        }
    }

    /// Create an InvalidDefinition error
    pub fn invalid_definition(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an AlreadyRegistered error
    pub fn already_registered(id: impl Into<String>) -> Self {
        Self::AlreadyRegistered { id: id.into() }
    }

    /// Create a TimeoutExceeded error
    pub fn timeout(id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::TimeoutExceeded {
            id: id.into(),
            timeout_ms,
        }
    }

    /// Create a ResourceExceeded error
    pub fn resource_exceeded(id: impl Into<String>, limit_bytes: usize) -> Self {
        Self::ResourceExceeded {
            id: id.into(),
            limit_bytes,
        }
    }

    /// Create an ExecutionFault error
    pub fn execution_fault(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFault {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Whether the failure came from the resource envelope rather than the snippet logic
    pub fn is_limit_violation(&self) -> bool {
        matches!(
            self,
            Self::TimeoutExceeded { .. } | Self::ResourceExceeded { .. }
        )
    }
}
