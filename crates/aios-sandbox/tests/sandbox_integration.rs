//! End-to-end tests running real WebAssembly snippets through wasmtime
//!
//! Run with: cargo test -p aios-sandbox --test sandbox_integration

use aios_sandbox::{
    ExecutionLimits, HelperExecutor, HelperSpec, SandboxConfig, SandboxError, ValidationHelper,
    ValidationRequest, ValidatorSpec, WasmRuntime,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DOUBLE: &str = r#"
(module
  (import "aios" "arg_f64" (func $arg (param i32 i32) (result f64)))
  (import "aios" "return_f64" (func $ret (param f64)))
  (memory (export "memory") 1)
  (data (i32.const 0) "x")
  (func (export "run")
    (call $ret (f64.mul (call $arg (i32.const 0) (i32.const 1)) (f64.const 2)))))
"#;

const SPIN_FOREVER: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "run") (loop $spin (br $spin))))
"#;

const BLOW_MEMORY: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "run") (drop (memory.grow (i32.const 512)))))
"#;

const SEVERAL_MEMORIES: &str = r#"
(module
  (memory (export "memory") 100)
  (memory 100)
  (memory 100)
  (memory 100)
  (func (export "run")
    (i32.store 1 (i32.const 6000000) (i32.const 1))
    (i32.store 3 (i32.const 6000000) (i32.const 1))))
"#;

const HUGE_TABLE: &str = r#"
(module
  (memory (export "memory") 1)
  (table 4000000 funcref)
  (func (export "run")
    (table.fill (i32.const 0) (ref.null func) (i32.const 4000000))))
"#;

const ALWAYS_INVALID: &str = r##"
(module
  (import "aios" "return_json" (func $ret (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "{\"valid\":false,\"errors\":[\"x\"]}")
  (func (export "run") (call $ret (i32.const 0) (i32.const 30))))
"##;

const POSITIVE_AMOUNT: &str = r##"
(module
  (import "aios" "arg_f64" (func $arg (param i32 i32) (result f64)))
  (import "aios" "return_json" (func $ret (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "args.amount")
  (data (i32.const 16) "{\"valid\":true,\"errors\":[]}")
  (data (i32.const 64) "{\"valid\":false,\"errors\":[\"amount must be positive\"]}")
  (func (export "run")
    (if (f64.gt (call $arg (i32.const 0) (i32.const 11)) (f64.const 0))
      (then (call $ret (i32.const 16) (i32.const 26)))
      (else (call $ret (i32.const 64) (i32.const 52))))))
"##;

fn fast_config() -> SandboxConfig {
    SandboxConfig {
        helper_limits: ExecutionLimits::new(Duration::from_millis(200), 8 << 20),
        validator_limits: ExecutionLimits::new(Duration::from_millis(200), 8 << 20),
        ..SandboxConfig::default()
    }
}

fn executor() -> HelperExecutor {
    HelperExecutor::with_runtime(Arc::new(WasmRuntime::new()), fast_config())
}

#[tokio::test]
async fn test_double_helper() {
    let executor = HelperExecutor::from_specs(vec![HelperSpec::new("double", DOUBLE)]);
    let value = executor.execute("double", json!({"x": 3})).await.unwrap();
    assert_eq!(value, json!(6));
}

#[tokio::test]
async fn test_unknown_helper_lists_available() {
    let executor = HelperExecutor::from_specs(vec![HelperSpec::new("double", DOUBLE)]);
    let err = executor.execute("nope", json!({})).await.unwrap_err();
    assert!(matches!(err, SandboxError::NotFound { .. }));
    assert!(err.to_string().contains("double"));
}

#[tokio::test]
async fn test_spinning_helper_times_out() {
    let executor = executor();
    executor.register(HelperSpec::new("spin", SPIN_FOREVER)).unwrap();

    let start = Instant::now();
    let err = executor.execute("spin", json!({})).await.unwrap_err();
    assert!(matches!(err, SandboxError::TimeoutExceeded { timeout_ms: 200, .. }), "{err}");
    assert!(start.elapsed() < Duration::from_secs(2));

    // the executor stays usable afterwards
    executor.register(HelperSpec::new("double", DOUBLE)).unwrap();
    assert_eq!(executor.execute("double", json!({"x": 1.5})).await.unwrap(), json!(3));
}

#[tokio::test]
async fn test_memory_blowup_is_contained() {
    let executor = executor();
    executor.register(HelperSpec::new("blow", BLOW_MEMORY)).unwrap();

    let err = executor.execute("blow", json!({})).await.unwrap_err();
    assert!(matches!(err, SandboxError::ResourceExceeded { .. }), "{err}");
    assert!(err.is_limit_violation());
}

#[tokio::test]
async fn test_ceiling_covers_all_memories_and_tables() {
    let executor = executor();
    executor.register(HelperSpec::new("memories", SEVERAL_MEMORIES)).unwrap();
    executor.register(HelperSpec::new("table", HUGE_TABLE)).unwrap();

    for id in ["memories", "table"] {
        let err = executor.execute(id, json!({})).await.unwrap_err();
        assert!(matches!(err, SandboxError::ResourceExceeded { .. }), "{id}: {err}");
    }
}

#[tokio::test]
async fn test_attachment_guard_skips_sandbox() {
    let executor = executor();
    // code that would trap if it ever ran
    executor
        .register(HelperSpec::new(
            "format-email-attachment",
            r#"(module (memory (export "memory") 1) (func (export "run") unreachable))"#,
        ))
        .unwrap();

    let data = "a".repeat(26 * 1024 * 1024);
    let value = executor
        .execute("format-email-attachment", json!({ "data": data }))
        .await
        .unwrap();
    assert_eq!(value["error"], "Attachment exceeds 25MB limit");
    assert_eq!(value["maxSize"], 26_214_400);
}

#[tokio::test]
async fn test_missing_validator_passes() {
    let validator = ValidationHelper::new();
    let result = validator.validate("anything", json!({"a": 1})).await;
    assert!(result.valid);
    assert!(result.errors.is_empty());
    assert_eq!(result.note.as_deref(), Some("No validator configured - passed by default"));
}

#[tokio::test]
async fn test_validator_reports_errors() {
    let validator = ValidationHelper::new();
    validator.register(ValidatorSpec::new("cmd", ALWAYS_INVALID)).unwrap();

    let result = validator.validate("cmd", json!({})).await;
    assert!(!result.valid);
    assert_eq!(result.errors, vec!["x"]);
    assert!(result.duration_ms.is_some());
    assert!(result.into_result("cmd").is_err());
}

#[tokio::test]
async fn test_validator_sees_wrapped_args() {
    let validator = ValidationHelper::new();
    validator
        .register(ValidatorSpec::new("transfer", POSITIVE_AMOUNT))
        .unwrap();

    assert!(validator.validate("transfer", json!({"amount": 10})).await.valid);

    let result = validator.validate("transfer", json!({"amount": -1})).await;
    assert_eq!(result.errors, vec!["amount must be positive"]);
}

#[tokio::test]
async fn test_validator_faults_become_invalid() {
    let validator = ValidationHelper::with_runtime(Arc::new(WasmRuntime::new()), fast_config());
    validator.register(ValidatorSpec::new("spin", SPIN_FOREVER)).unwrap();
    validator.register(ValidatorSpec::new("empty", "  ")).unwrap();
    validator.register(ValidatorSpec::new("blow", BLOW_MEMORY)).unwrap();
    validator.register(ValidatorSpec::new("broken", "(module (func")).unwrap();

    let spin = validator.validate("spin", json!({})).await;
    assert!(!spin.valid);
    assert!(spin.errors[0].contains("exceeded 200ms timeout"));

    let empty = validator.validate("empty", json!({})).await;
    assert_eq!(empty.errors, vec!["Validator for 'empty' has no code defined"]);

    let blow = validator.validate("blow", json!({})).await;
    assert!(!blow.valid);
    assert_eq!(blow.errors, vec!["Validator 'blow' exceeded 8MB memory limit."]);

    let broken = validator.validate("broken", json!({})).await;
    assert!(broken.errors[0].starts_with("Validation error in 'broken'"));

    // a validator that returns nothing is a malformed result
    validator
        .replace(ValidatorSpec::new(
            "broken",
            r#"(module (memory (export "memory") 1) (func (export "run")))"#,
        ))
        .unwrap();
    let silent = validator.validate("broken", json!({})).await;
    assert!(!silent.valid);
    assert!(silent.errors[0].contains("returned invalid format"));
}

#[tokio::test]
async fn test_validate_batch_preserves_order() {
    let validator = ValidationHelper::new();
    validator.register(ValidatorSpec::new("cmd", ALWAYS_INVALID)).unwrap();

    let results = validator
        .validate_batch(vec![
            ValidationRequest::new("cmd", json!({})),
            ValidationRequest::new("free", json!({})),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].command, "cmd");
    assert!(!results[0].result.valid);
    assert!(results[1].result.valid);
}
