//! Resource envelopes for helper and validator runs
//!
//! Defaults match the limits the helper schemas were written against; every
//! value can be overridden through `AIOS_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: String, value: String },
}

/// Helper id whose `data` argument is size-checked before entering the sandbox
pub const ATTACHMENT_HELPER_ID: &str = "format-email-attachment";

/// Largest attachment payload accepted by the attachment helper (25 MiB)
pub const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

const MIB: usize = 1024 * 1024;

/// Limits applied to a single bounded execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Hard wall-clock deadline
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Hard linear-memory ceiling in bytes
    pub memory_bytes: usize,
}

impl ExecutionLimits {
    pub const fn new(timeout: Duration, memory_bytes: usize) -> Self {
        Self {
            timeout,
            memory_bytes,
        }
    }

    /// Envelope for helpers: 1s, 8 MiB
    pub const fn helper() -> Self {
        Self::new(Duration::from_millis(1000), 8 * MIB)
    }

    /// Envelope for validators: 500ms, 8 MiB
    pub const fn validator() -> Self {
        Self::new(Duration::from_millis(500), 8 * MIB)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Sandbox configuration shared by the helper executor and validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Envelope for `HelperExecutor::execute`
    pub helper_limits: ExecutionLimits,
    /// Envelope for `ValidationHelper::validate`
    pub validator_limits: ExecutionLimits,
    /// Soft target for validators; breaching it only logs
    #[serde(with = "millis")]
    pub validator_target: Duration,
    /// Helper id subject to the attachment size guard
    pub attachment_helper: String,
    /// Attachment size ceiling in bytes
    pub max_attachment_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            helper_limits: ExecutionLimits::helper(),
            validator_limits: ExecutionLimits::validator(),
            validator_target: Duration::from_millis(50),
            attachment_helper: ATTACHMENT_HELPER_ID.to_string(),
            max_attachment_bytes: MAX_ATTACHMENT_BYTES,
        }
    }
}

impl SandboxConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>("AIOS_HELPER_TIMEOUT_MS")? {
            config.helper_limits.timeout = Duration::from_millis(ms);
        }
        if let Some(mb) = parse_var::<usize>("AIOS_HELPER_MEMORY_MB")? {
            config.helper_limits.memory_bytes = megabytes("AIOS_HELPER_MEMORY_MB", mb)?;
        }
        if let Some(ms) = parse_var::<u64>("AIOS_VALIDATOR_TIMEOUT_MS")? {
            config.validator_limits.timeout = Duration::from_millis(ms);
        }
        if let Some(mb) = parse_var::<usize>("AIOS_VALIDATOR_MEMORY_MB")? {
            config.validator_limits.memory_bytes = megabytes("AIOS_VALIDATOR_MEMORY_MB", mb)?;
        }
        if let Some(ms) = parse_var::<u64>("AIOS_VALIDATOR_TARGET_MS")? {
            config.validator_target = Duration::from_millis(ms);
        }
        if let Some(bytes) = parse_var::<usize>("AIOS_ATTACHMENT_MAX_BYTES")? {
            config.max_attachment_bytes = bytes;
        }
        if let Ok(id) = env::var("AIOS_ATTACHMENT_HELPER") {
            config.attachment_helper = id;
        }

        Ok(config)
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

fn megabytes(var: &str, mb: usize) -> Result<usize, ConfigError> {
    mb.checked_mul(MIB).ok_or_else(|| ConfigError::Invalid {
        var: var.to_string(),
        value: mb.to_string(),
    })
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.helper_limits.timeout_ms(), 1000);
        assert_eq!(config.helper_limits.memory_bytes, 8 * 1024 * 1024);
        assert_eq!(config.validator_limits.timeout_ms(), 500);
        assert_eq!(config.validator_target, Duration::from_millis(50));
        assert_eq!(config.max_attachment_bytes, 26_214_400);
        assert_eq!(config.attachment_helper, "format-email-attachment");
    }

    #[test]
    fn test_megabytes_rejects_overflow() {
        assert_eq!(megabytes("AIOS_HELPER_MEMORY_MB", 16).unwrap(), 16 * 1024 * 1024);

        let err = megabytes("AIOS_HELPER_MEMORY_MB", usize::MAX / 2).unwrap_err();
        assert!(err.to_string().contains("AIOS_HELPER_MEMORY_MB"));
    }

    #[test]
    fn test_limits_serialize_as_millis() {
        let json = serde_json::to_value(ExecutionLimits::validator()).unwrap();
        assert_eq!(json["timeout"], 500);
        assert_eq!(json["memory_bytes"], 8 * 1024 * 1024);
    }
}
