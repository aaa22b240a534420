//! Helper executor: run registered snippets under the helper envelope
//!
//! Each call to [`HelperExecutor::execute`]:
//! 1. Looks the helper up in the registry (snapshot, no lock held while running)
//! 2. Applies the attachment size guard ahead of the sandbox
//! 3. Creates a fresh context with the memory ceiling
//! 4. Runs the snippet with the hard timeout and copies the result out
//! 5. Drops the context, whatever the outcome

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::registry::{RegistryEntry, RegistryStats, SpecRegistry};
use crate::runtime::{BoundedRuntime, RuntimeFault};
use crate::wasm::WasmRuntime;

const DEFAULT_LANGUAGE: &str = "wat";

/// A registered helper snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperSpec {
    pub id: String,
    /// Snippet source (`function` in older tool schemas)
    #[serde(default, alias = "function")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl HelperSpec {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            language: None,
            runtime: None,
        }
    }

    fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

impl RegistryEntry for HelperSpec {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Helper metadata without its code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperInfo {
    pub id: String,
    pub language: String,
    pub runtime: String,
    pub has_code: bool,
}

/// Executes helpers by id inside a [`BoundedRuntime`].
///
/// # Example
///
/// ```ignore
/// use aios_sandbox::{HelperExecutor, HelperSpec};
///
/// let executor = HelperExecutor::new();
/// executor.register(HelperSpec::new("double", DOUBLE_WAT))?;
///
/// let value = executor.execute("double", json!({"n": 3})).await?;
/// assert_eq!(value, json!(6));
/// ```
pub struct HelperExecutor {
    registry: SpecRegistry<HelperSpec>,
    runtime: Arc<dyn BoundedRuntime>,
    config: SandboxConfig,
}

impl Default for HelperExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl HelperExecutor {
    /// Executor backed by [`WasmRuntime`] with default limits
    pub fn new() -> Self {
        Self::with_runtime(Arc::new(WasmRuntime::new()), SandboxConfig::default())
    }

    pub fn with_runtime(runtime: Arc<dyn BoundedRuntime>, config: SandboxConfig) -> Self {
        Self {
            registry: SpecRegistry::new(),
            runtime,
            config,
        }
    }

    /// Bulk-load definitions, skipping entries without an id or code
    pub fn from_specs(specs: impl IntoIterator<Item = HelperSpec>) -> Self {
        let executor = Self::new();
        executor.load(specs);
        executor
    }

    /// Register every usable definition, later duplicates replacing earlier ones.
    /// Returns the number of helpers loaded.
    pub fn load(&self, specs: impl IntoIterator<Item = HelperSpec>) -> usize {
        let mut loaded = 0;
        for spec in specs {
            if spec.id.trim().is_empty() || !spec.has_code() {
                warn!(helper = %spec.id, "Skipping helper definition without id or code");
                continue;
            }
            if self.registry.replace(spec).is_ok() {
                loaded += 1;
            }
        }
        loaded
    }

    /// Register a helper; fails if the id is taken
    pub fn register(&self, spec: HelperSpec) -> Result<(), SandboxError> {
        self.registry.register(spec)
    }

    /// Register or overwrite a helper (hot reload)
    pub fn replace(&self, spec: HelperSpec) -> Result<(), SandboxError> {
        self.registry.replace(spec)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.registry.remove(id)
    }

    pub fn clear(&self) {
        self.registry.clear()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    /// Registered helper ids, sorted
    pub fn list(&self) -> Vec<String> {
        self.registry.keys()
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Metadata for a helper, without its code
    pub fn info(&self, id: &str) -> Option<HelperInfo> {
        self.registry.get(id).map(|spec| HelperInfo {
            id: spec.id.clone(),
            language: spec
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            runtime: spec
                .runtime
                .clone()
                .unwrap_or_else(|| self.runtime.name().to_string()),
            has_code: spec.has_code(),
        })
    }

    /// Execute a helper by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - the snippet's result (may itself be error-shaped)
    /// * `Err(SandboxError)` - lookup, definition, limit or runtime failure
    pub async fn execute(&self, id: &str, args: Value) -> Result<Value, SandboxError> {
        let spec = self.registry.get(id).ok_or_else(|| {
            warn!(helper = id, "Helper not found");
            SandboxError::not_found(id, self.registry.keys())
        })?;

        if !spec.has_code() {
            return Err(SandboxError::invalid_definition(id, "helper has no code defined"));
        }

        if let Some(rejection) = self.check_attachment(id, &args) {
            return Ok(rejection);
        }

        let limits = self.config.helper_limits;
        debug!(
            helper = id,
            timeout_ms = limits.timeout_ms(),
            memory_bytes = limits.memory_bytes,
            "Executing helper"
        );

        let start = Instant::now();
        let context = self
            .runtime
            .create_context(limits.memory_bytes)
            .map_err(|fault| SandboxError::execution_fault(id, fault.to_string()))?;

        let outcome = context.run(&spec.code, args, limits.timeout).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                info!(helper = id, elapsed_ms, "Helper executed successfully");
                Ok(value)
            }
            Err(RuntimeFault::Timeout) => {
                error!(helper = id, timeout_ms = limits.timeout_ms(), "Helper timed out");
                Err(SandboxError::timeout(id, limits.timeout_ms()))
            }
            Err(RuntimeFault::MemoryExceeded) => {
                error!(
                    helper = id,
                    memory_bytes = limits.memory_bytes,
                    "Helper exceeded memory limit"
                );
                Err(SandboxError::resource_exceeded(id, limits.memory_bytes))
            }
            Err(fault) => {
                warn!(helper = id, elapsed_ms, error = %fault, "Helper execution failed");
                Err(SandboxError::execution_fault(id, fault.to_string()))
            }
        }
    }

    /// Size guard for the attachment helper, evaluated before entering the sandbox
    fn check_attachment(&self, id: &str, args: &Value) -> Option<Value> {
        if id != self.config.attachment_helper {
            return None;
        }
        let size = match args.get("data")? {
            Value::String(data) => data.len(),
            Value::Array(bytes) => bytes.len(),
            _ => return None,
        };
        if size <= self.config.max_attachment_bytes {
            return None;
        }
        warn!(
            helper = id,
            size,
            max = self.config.max_attachment_bytes,
            "Attachment rejected before sandbox"
        );
        Some(json!({
            "error": format!(
                "Attachment exceeds {}MB limit",
                self.config.max_attachment_bytes / (1024 * 1024)
            ),
            "maxSize": self.config.max_attachment_bytes,
        }))
    }
}

impl std::fmt::Debug for HelperExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperExecutor")
            .field("helpers", &self.registry.keys())
            .field("runtime", &self.runtime.name())
            .field("limits", &self.config.helper_limits)
            .finish()
    }
}
