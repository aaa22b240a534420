//! Provider call contract

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a provider call resolves to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResponse {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Why a branch produced no usable output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The call itself failed
    #[error("{0}")]
    Failed(String),

    /// The call resolved with `success: false`
    #[error("provider reported failure: {}", .0.as_deref().unwrap_or("no details"))]
    Unsuccessful(Option<String>),

    /// The branch missed its deadline
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The spawned task panicked or was cancelled
    #[error("provider task aborted: {0}")]
    Aborted(String),
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(ProviderError::failed("boom").to_string(), "boom");
        assert_eq!(
            ProviderError::Unsuccessful(None).to_string(),
            "provider reported failure: no details"
        );
        assert_eq!(
            ProviderError::Timeout { timeout_ms: 100 }.to_string(),
            "timed out after 100ms"
        );
    }

    #[test]
    fn test_response_deserializes_loosely() {
        let response: ProviderResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(response.success);
        assert!(response.output.is_none());
    }
}
