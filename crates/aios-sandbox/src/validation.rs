//! Pre-execution argument validation
//!
//! Validators are snippets keyed by the command they validate. They run in
//! the same kind of isolated context as helpers, with a tighter envelope
//! (500ms hard, 50ms soft target). Unlike helpers, validation never returns
//! an error: missing validators pass, and every fault becomes
//! `{valid: false, errors: [...]}`.
//!
//! [`ValidationHelper::validate_declarative`] skips the sandbox entirely and
//! only walks the validator's declarative checks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::registry::{RegistryEntry, RegistryStats, SpecRegistry};
use crate::runtime::{BoundedRuntime, RuntimeFault};
use crate::wasm::WasmRuntime;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/?#]+[^\s]*$").expect("valid url regex")
});

/// String formats understood by declarative checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    Email,
    Url,
}

impl FieldFormat {
    fn matches(self, value: &str) -> bool {
        match self {
            Self::Email => EMAIL_RE.is_match(value),
            Self::Url => URL_RE.is_match(value),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Url => "url",
        }
    }
}

/// A field that must match a string format when present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRule {
    pub field: String,
    pub format: FieldFormat,
}

/// A declarative check evaluated without the sandbox
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarativeCheck {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatRule>,
}

impl DeclarativeCheck {
    pub fn required(fields: &[&str]) -> Self {
        Self {
            required_fields: fields.iter().map(|f| f.to_string()).collect(),
            format: None,
        }
    }

    pub fn format(field: impl Into<String>, format: FieldFormat) -> Self {
        Self {
            required_fields: Vec::new(),
            format: Some(FormatRule {
                field: field.into(),
                format,
            }),
        }
    }
}

/// A registered validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Command this validator guards
    pub validates: String,
    /// Snippet source (`function` in older tool schemas)
    #[serde(default, alias = "function")]
    pub code: String,
    #[serde(default)]
    pub checks: Vec<DeclarativeCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ValidatorSpec {
    pub fn new(validates: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: None,
            validates: validates.into(),
            code: code.into(),
            checks: Vec::new(),
            language: None,
        }
    }

    pub fn with_checks(mut self, checks: Vec<DeclarativeCheck>) -> Self {
        self.checks = checks;
        self
    }

    fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

impl RegistryEntry for ValidatorSpec {
    fn key(&self) -> &str {
        &self.validates
    }
}

/// Validator definitions as shipped in tool schemas: either a bare list or
/// an executable-knowledge object with a `validators` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValidatorDefinitions {
    List(Vec<ValidatorSpec>),
    Knowledge { validators: Vec<ValidatorSpec> },
}

impl ValidatorDefinitions {
    pub fn into_specs(self) -> Vec<ValidatorSpec> {
        match self {
            Self::List(specs) | Self::Knowledge { validators: specs } => specs,
        }
    }
}

/// Validator metadata without its code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub id: Option<String>,
    pub validates: String,
    pub language: String,
    pub checks: Vec<DeclarativeCheck>,
    pub has_code: bool,
}

/// Outcome of one validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            note: None,
            duration_ms: None,
            kind: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self::from_errors(vec![error.into()])
    }

    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            ..Self::pass()
        }
    }

    fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    /// Turn a negative result into [`SandboxError::ValidationFailure`]
    pub fn into_result(self, command: &str) -> Result<(), SandboxError> {
        if self.valid {
            Ok(())
        } else {
            Err(SandboxError::ValidationFailure {
                command: command.to_string(),
                errors: self.errors,
            })
        }
    }
}

/// One entry of a batch validation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub command: String,
    #[serde(default)]
    pub args: Value,
}

impl ValidationRequest {
    pub fn new(command: impl Into<String>, args: Value) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

/// One entry of a batch validation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchValidation {
    pub command: String,
    pub result: ValidationResult,
}

/// Runs validators inside a [`BoundedRuntime`].
pub struct ValidationHelper {
    registry: SpecRegistry<ValidatorSpec>,
    runtime: Arc<dyn BoundedRuntime>,
    config: SandboxConfig,
}

impl Default for ValidationHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationHelper {
    /// Validator backed by [`WasmRuntime`] with default limits
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

    /// Load validators from a list or an executable-knowledge object.
    /// Entries without a command are skipped.
    pub fn from_definitions(definitions: Value) -> Result<Self, serde_json::Error> {
        let specs = serde_json::from_value::<ValidatorDefinitions>(definitions)?.into_specs();
        let helper = Self::new();
        helper.load(specs);
        Ok(helper)
    }

    /// Register every definition that names a command. Returns the number loaded.
    pub fn load(&self, specs: impl IntoIterator<Item = ValidatorSpec>) -> usize {
        specs
            .into_iter()
            .filter_map(|spec| {
                if spec.validates.trim().is_empty() {
                    warn!("Skipping validator definition without `validates`");
                    return None;
                }
                self.registry.replace(spec).ok()
            })
            .count()
    }

    /// Register a validator; fails if the command already has one
    pub fn register(&self, spec: ValidatorSpec) -> Result<(), SandboxError> {
        self.registry.register(spec)
    }

    /// Register or overwrite a validator (hot reload)
    pub fn replace(&self, spec: ValidatorSpec) -> Result<(), SandboxError> {
        self.registry.replace(spec)
    }

    pub fn remove(&self, command: &str) -> bool {
        self.registry.remove(command)
    }

    pub fn clear(&self) {
        self.registry.clear()
    }

    pub fn contains(&self, command: &str) -> bool {
        self.registry.contains(command)
    }

    /// Commands with a validator, sorted
    pub fn list(&self) -> Vec<String> {
        self.registry.keys()
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn info(&self, command: &str) -> Option<ValidatorInfo> {
        self.registry.get(command).map(|spec| ValidatorInfo {
            id: spec.id.clone(),
            validates: spec.validates.clone(),
            language: spec.language.clone().unwrap_or_else(|| "wat".to_string()),
            checks: spec.checks.clone(),
            has_code: spec.has_code(),
        })
    }

    /// Validate `args` for `command`. Never fails; every outcome is data.
    pub async fn validate(&self, command: &str, args: Value) -> ValidationResult {
        let Some(spec) = self.registry.get(command) else {
            return ValidationResult::pass()
                .with_note("No validator configured - passed by default");
        };

        if !spec.has_code() {
            return ValidationResult::fail(format!(
                "Validator for '{command}' has no code defined"
            ));
        }

        let limits = self.config.validator_limits;
        let context = match self.runtime.create_context(limits.memory_bytes) {
            Ok(context) => context,
            Err(fault) => {
                return ValidationResult::fail(format!("Validation error in '{command}': {fault}"))
            }
        };

        let start = Instant::now();
        let outcome = context
            .run(&spec.code, json!({ "args": args }), limits.timeout)
            .await;
        let duration = start.elapsed();

        if duration > self.config.validator_target {
            warn!(
                command,
                elapsed_ms = duration.as_millis() as u64,
                target_ms = self.config.validator_target.as_millis() as u64,
                "Validator exceeded soft target"
            );
        }

        match outcome {
            Ok(value) => {
                let mut result = normalize(command, &value);
                result.duration_ms = Some(duration.as_millis() as u64);
                debug!(command, valid = result.valid, "Validator completed");
                result
            }
            Err(RuntimeFault::Timeout) => ValidationResult::fail(format!(
                "Validator '{command}' exceeded {}ms timeout. Validation failed for safety.",
                limits.timeout_ms()
            )),
            Err(RuntimeFault::MemoryExceeded) => ValidationResult::fail(format!(
                "Validator '{command}' exceeded {}MB memory limit.",
                limits.memory_bytes / (1024 * 1024)
            )),
            Err(fault) => {
                ValidationResult::fail(format!("Validation error in '{command}': {fault}"))
            }
        }
    }

    /// Validate several commands in order
    pub async fn validate_batch(&self, requests: Vec<ValidationRequest>) -> Vec<BatchValidation> {
        let mut results = Vec::with_capacity(requests.len());
        for ValidationRequest { command, args } in requests {
            let result = self.validate(&command, args).await;
            results.push(BatchValidation { command, result });
        }
        results
    }

    /// Run only the declarative checks, without the sandbox
    pub fn validate_declarative(&self, command: &str, args: &Value) -> ValidationResult {
        let Some(spec) = self.registry.get(command).filter(|s| !s.checks.is_empty()) else {
            return ValidationResult::pass().with_note("No declarative checks");
        };

        let mut errors = Vec::new();
        for check in &spec.checks {
            for field in &check.required_fields {
                if !args.get(field).is_some_and(is_truthy) {
                    errors.push(format!("Required field '{field}' is missing"));
                }
            }

            if let Some(rule) = &check.format {
                if let Some(value) = args.get(&rule.field).filter(|v| is_truthy(v)) {
                    let ok = value.as_str().is_some_and(|s| rule.format.matches(s));
                    if !ok {
                        errors.push(format!(
                            "Field '{}' is not a valid {}",
                            rule.field,
                            rule.format.label()
                        ));
                    }
                }
            }
        }

        let mut result = ValidationResult::from_errors(errors);
        result.kind = Some("declarative".to_string());
        result
    }

    /// Declarative checks first, sandboxed validator only if they pass
    pub async fn validate_full(&self, command: &str, args: Value) -> ValidationResult {
        let declarative = self.validate_declarative(command, &args);
        if !declarative.valid {
            return declarative;
        }
        self.validate(command, args).await
    }
}

impl std::fmt::Debug for ValidationHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationHelper")
            .field("validators", &self.registry.keys())
            .field("runtime", &self.runtime.name())
            .field("limits", &self.config.validator_limits)
            .finish()
    }
}

/// Coerce whatever the validator returned into a result
fn normalize(command: &str, value: &Value) -> ValidationResult {
    let Value::Object(map) = value else {
        return ValidationResult::fail(format!(
            "Validator '{command}' returned invalid format. Expected {{valid: boolean, errors: array}}."
        ));
    };

    let errors = match map.get("errors") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    ValidationResult {
        valid: map.get("valid").is_some_and(is_truthy),
        errors,
        ..ValidationResult::pass()
    }
}

/// Loose truthiness: null, false, 0, NaN and "" are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
