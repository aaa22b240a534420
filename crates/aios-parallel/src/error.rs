//! Orchestration errors

use thiserror::Error;

use crate::executor::BranchFailure;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParallelError {
    /// Neither branch produced usable output
    #[error("Both providers failed")]
    BothProvidersFailed { failures: Vec<BranchFailure> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_stable() {
        let err = ParallelError::BothProvidersFailed { failures: vec![] };
        assert_eq!(err.to_string(), "Both providers failed");
    }
}
