//! # AIOS Sandbox
//!
//! Bounded execution of untrusted tool snippets.
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | [`HelperExecutor`] | Runs registered helper snippets, returns their value or a classified error |
//! | [`ValidationHelper`] | Runs per-command validators, always answers `{valid, errors}` |
//! | [`WasmRuntime`] | Default [`BoundedRuntime`] built on wasmtime |
//!
//! Every run gets a fresh context with its own memory ceiling and a hard
//! deadline. Contexts are never reused.
//!
//! ## Helper snippets
//!
//! Snippets are WebAssembly text modules exporting `memory` and a
//! `run: () -> ()` function. They talk to the host through the `aios`
//! import namespace:
//!
//! ```rust
//! use aios_sandbox::{HelperExecutor, HelperSpec};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let executor = HelperExecutor::new();
//! executor.register(HelperSpec::new(
//!     "double",
//!     r#"(module
//!         (import "aios" "arg_f64" (func $arg (param i32 i32) (result f64)))
//!         (import "aios" "return_f64" (func $ret (param f64)))
//!         (memory (export "memory") 1)
//!         (data (i32.const 0) "x")
//!         (func (export "run")
//!           (call $ret (f64.mul (call $arg (i32.const 0) (i32.const 1)) (f64.const 2)))))"#,
//! )).unwrap();
//!
//! let value = executor.execute("double", json!({"x": 3})).await.unwrap();
//! assert_eq!(value, json!(6));
//! # });
//! ```

pub mod config;
pub mod error;
pub mod helper;
pub mod registry;
pub mod runtime;
pub mod validation;
pub mod wasm;

pub use config::{
    ConfigError, ExecutionLimits, SandboxConfig, ATTACHMENT_HELPER_ID, MAX_ATTACHMENT_BYTES,
};
pub use error::SandboxError;
pub use helper::{HelperExecutor, HelperInfo, HelperSpec};
pub use registry::{RegistryEntry, RegistryStats, SpecRegistry};
pub use runtime::{BoundedContext, BoundedRuntime, RuntimeFault};
pub use validation::{
    BatchValidation, DeclarativeCheck, FieldFormat, FormatRule, ValidationHelper,
    ValidationRequest, ValidationResult, ValidatorDefinitions, ValidatorInfo, ValidatorSpec,
};
pub use wasm::{WasmRuntime, ENTRY_POINT, HOST_MODULE};
