//! WebAssembly-backed bounded runtime
//!
//! Every context owns its own `Engine` and `Store`, so nothing is shared
//! between runs. The wall-clock deadline is enforced with epoch
//! interruption: a tokio timer bumps the engine epoch when the deadline
//! passes and the guest traps at its next loop header or call. The memory
//! ceiling is enforced by a `ResourceLimiter` on the store and covers every
//! linear memory and table of the context together.
//!
//! # Snippet ABI
//!
//! A snippet is a WebAssembly module (text or binary) that exports `memory`
//! and a `run` function taking and returning nothing. The only imports
//! available live in the `aios` namespace:
//!
//! | Import | Signature | Meaning |
//! |--------|-----------|---------|
//! | `args_len` | `() -> i32` | byte length of the JSON-encoded args |
//! | `args_read` | `(ptr: i32)` | copy the JSON-encoded args into guest memory |
//! | `arg_f64` | `(ptr: i32, len: i32) -> f64` | numeric arg at a dotted path, NaN if absent |
//! | `return_f64` | `(value: f64)` | set the result to a number |
//! | `return_json` | `(ptr: i32, len: i32)` | set the result to a JSON document in guest memory |
//!
//! A snippet that never calls a `return_*` import yields `null`.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use wasmtime::{
    Caller, Config, Engine, Extern, Linker, Memory, Module, ResourceLimiter, Store, Trap,
};

use crate::runtime::{BoundedContext, BoundedRuntime, RuntimeFault};

/// Import namespace exposed to snippets
pub const HOST_MODULE: &str = "aios";

/// Export invoked to run a snippet
pub const ENTRY_POINT: &str = "run";

/// Extra time granted to compilation before the caller stops waiting
const COMPILE_GRACE: Duration = Duration::from_millis(250);

/// Largest integer an f64 represents exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Runtime that executes WebAssembly snippets with wasmtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmRuntime;

impl WasmRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl BoundedRuntime for WasmRuntime {
    fn name(&self) -> &str {
        "wasmtime"
    }

    fn create_context(
        &self,
        memory_bytes: usize,
    ) -> Result<Box<dyn BoundedContext>, RuntimeFault> {
        let mut config = Config::new();
        config.epoch_interruption(true);

        let engine = Engine::new(&config)
            .map_err(|e| RuntimeFault::Trap(format!("failed to create engine: {e}")))?;

        let mut store = Store::new(&engine, HostState::new(memory_bytes));
        store.limiter(|state| &mut state.limiter);

        Ok(Box::new(WasmContext { engine, store }))
    }
}

/// A single-use engine/store pair. Dropped after one run.
struct WasmContext {
    engine: Engine,
    store: Store<HostState>,
}

#[async_trait]
impl BoundedContext for WasmContext {
    async fn run(
        self: Box<Self>,
        code: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<Value, RuntimeFault> {
        let WasmContext { engine, mut store } = *self;
        store.data_mut().load_args(args)?;

        // armed before the ticker starts so an early tick is never missed
        store.set_epoch_deadline(1);
        store.epoch_deadline_trap();

        let ticker = {
            let engine = engine.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                engine.increment_epoch();
            })
        };

        let code = code.to_owned();
        let worker = tokio::task::spawn_blocking(move || run_module(&engine, &mut store, &code));

        // The worker owns the store; it is released when the worker returns,
        // including when we stop waiting for it here.
        let outcome = tokio::time::timeout(timeout + COMPILE_GRACE, worker).await;
        ticker.abort();

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(RuntimeFault::Trap(format!(
                "sandbox worker failed: {join_err}"
            ))),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Sandbox worker missed its deadline"
                );
                Err(RuntimeFault::Timeout)
            }
        }
    }
}

fn run_module(
    engine: &Engine,
    store: &mut Store<HostState>,
    code: &str,
) -> Result<Value, RuntimeFault> {
    let module = Module::new(engine, code).map_err(|e| RuntimeFault::Compile(format!("{e:#}")))?;

    let mut linker = Linker::new(engine);
    link_host_abi(&mut linker).map_err(|e| RuntimeFault::Compile(format!("{e:#}")))?;

    let instance = match linker.instantiate(&mut *store, &module) {
        Ok(instance) => instance,
        Err(err) => return Err(classify(store, err)),
    };

    let entry = instance
        .get_typed_func::<(), ()>(&mut *store, ENTRY_POINT)
        .map_err(|e| RuntimeFault::Compile(format!("missing `{ENTRY_POINT}` export: {e:#}")))?;

    if let Err(err) = entry.call(&mut *store, ()) {
        return Err(classify(store, err));
    }

    let state = store.data_mut();
    if state.limiter.exceeded {
        return Err(RuntimeFault::MemoryExceeded);
    }
    if let Some(message) = state.fault.take() {
        return Err(RuntimeFault::Trap(message));
    }

    debug!("Snippet completed");
    Ok(state.result.take().unwrap_or(Value::Null))
}

fn classify(store: &Store<HostState>, err: wasmtime::Error) -> RuntimeFault {
    if store.data().limiter.exceeded {
        return RuntimeFault::MemoryExceeded;
    }
    match err.downcast_ref::<Trap>() {
        Some(Trap::Interrupt) => RuntimeFault::Timeout,
        _ => RuntimeFault::Trap(format!("{err:#}")),
    }
}

/// Per-run host data. Arguments are held as owned copies.
struct HostState {
    args: Value,
    args_json: Vec<u8>,
    result: Option<Value>,
    fault: Option<String>,
    limiter: CeilingLimiter,
}

impl HostState {
    fn new(memory_bytes: usize) -> Self {
        Self {
            args: Value::Null,
            args_json: Vec::new(),
            result: None,
            fault: None,
            limiter: CeilingLimiter::new(memory_bytes),
        }
    }

    fn load_args(&mut self, args: Value) -> Result<(), RuntimeFault> {
        self.args_json = serde_json::to_vec(&args)
            .map_err(|e| RuntimeFault::Trap(format!("arguments are not serializable: {e}")))?;
        self.args = args;
        Ok(())
    }
}

/// Host bytes charged per table element
const TABLE_ELEMENT_BYTES: usize = std::mem::size_of::<usize>();

/// Store-wide ceiling shared by every memory and table of a context.
///
/// Growth is charged against one running total, so declaring several
/// memories or a large table does not buy extra room. A denied growth is
/// remembered so the run is reported as a memory fault even when the guest
/// ignores the failed `memory.grow`.
struct CeilingLimiter {
    ceiling: usize,
    used: usize,
    exceeded: bool,
}

impl CeilingLimiter {
    fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            used: 0,
            exceeded: false,
        }
    }

    fn charge(&mut self, additional: usize) -> bool {
        match self.used.checked_add(additional) {
            Some(total) if total <= self.ceiling => {
                self.used = total;
                true
            }
            _ => {
                self.exceeded = true;
                false
            }
        }
    }
}

impl ResourceLimiter for CeilingLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        if maximum.is_some_and(|max| desired > max) {
            return Ok(false);
        }
        Ok(self.charge(desired.saturating_sub(current)))
    }

    fn table_growing(
        &mut self,
        current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        if maximum.is_some_and(|max| desired > max) {
            return Ok(false);
        }
        let added = desired.saturating_sub(current);
        Ok(self.charge(added.saturating_mul(TABLE_ELEMENT_BYTES)))
    }
}

fn link_host_abi(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(HOST_MODULE, "args_len", |caller: Caller<'_, HostState>| -> i32 {
        caller.data().args_json.len() as i32
    })?;

    linker.func_wrap(
        HOST_MODULE,
        "args_read",
        |mut caller: Caller<'_, HostState>, ptr: i32| {
            let bytes = caller.data().args_json.clone();
            if let Err(message) = write_guest(&mut caller, ptr, &bytes) {
                record_fault(&mut caller, message);
            }
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "arg_f64",
        |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> f64 {
            let path = read_guest(&mut caller, ptr, len).and_then(|bytes| {
                String::from_utf8(bytes).map_err(|_| "argument path is not UTF-8".to_string())
            });
            match path {
                Ok(path) => lookup_number(&caller.data().args, &path).unwrap_or(f64::NAN),
                Err(message) => {
                    record_fault(&mut caller, message);
                    f64::NAN
                }
            }
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "return_f64",
        |mut caller: Caller<'_, HostState>, value: f64| {
            caller.data_mut().result = Some(number_value(value));
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "return_json",
        |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
            let parsed = read_guest(&mut caller, ptr, len).and_then(|bytes| {
                serde_json::from_slice::<Value>(&bytes)
                    .map_err(|e| format!("snippet returned invalid JSON: {e}"))
            });
            match parsed {
                Ok(value) => caller.data_mut().result = Some(value),
                Err(message) => record_fault(&mut caller, message),
            }
        },
    )?;

    Ok(())
}

fn guest_memory(caller: &mut Caller<'_, HostState>) -> Result<Memory, String> {
    caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| "snippet does not export `memory`".to_string())
}

fn read_guest(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> Result<Vec<u8>, String> {
    let memory = guest_memory(caller)?;
    let offset = ptr as u32 as usize;
    let len = usize::try_from(len).map_err(|_| "negative length".to_string())?;
    if offset.saturating_add(len) > memory.data_size(&*caller) {
        return Err("read outside guest memory".to_string());
    }
    let mut buf = vec![0u8; len];
    memory
        .read(&*caller, offset, &mut buf)
        .map_err(|_| "read outside guest memory".to_string())?;
    Ok(buf)
}

fn write_guest(caller: &mut Caller<'_, HostState>, ptr: i32, bytes: &[u8]) -> Result<(), String> {
    let memory = guest_memory(caller)?;
    memory
        .write(&mut *caller, ptr as u32 as usize, bytes)
        .map_err(|_| "write outside guest memory".to_string())
}

fn record_fault(caller: &mut Caller<'_, HostState>, message: String) {
    caller.data_mut().fault.get_or_insert(message);
}

/// Resolve a dotted path (`a.b.0`) to a number
fn lookup_number(args: &Value, path: &str) -> Option<f64> {
    let mut current = args;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Integral values come back as JSON integers, the rest as floats
fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOUBLE: &str = r#"
        (module
          (import "aios" "arg_f64" (func $arg (param i32 i32) (result f64)))
          (import "aios" "return_f64" (func $ret (param f64)))
          (memory (export "memory") 1)
          (data (i32.const 0) "n")
          (func (export "run")
            (call $ret (f64.mul (call $arg (i32.const 0) (i32.const 1)) (f64.const 2)))))
    "#;

    async fn run(
        code: &str,
        args: Value,
        memory: usize,
        timeout_ms: u64,
    ) -> Result<Value, RuntimeFault> {
        let context = WasmRuntime::new().create_context(memory).unwrap();
        context
            .run(code, args, Duration::from_millis(timeout_ms))
            .await
    }

    #[tokio::test]
    async fn test_double() {
        let value = run(DOUBLE, json!({"n": 3}), 8 << 20, 1000).await.unwrap();
        assert_eq!(value, json!(6));
    }

    #[tokio::test]
    async fn test_missing_arg_is_nan_and_serializes_null() {
        let value = run(DOUBLE, json!({}), 8 << 20, 1000).await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_no_return_yields_null() {
        let code = r#"(module (memory (export "memory") 1) (func (export "run")))"#;
        assert_eq!(run(code, json!({}), 8 << 20, 1000).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_args_roundtrip_through_guest_memory() {
        let code = r#"
            (module
              (import "aios" "args_len" (func $len (result i32)))
              (import "aios" "args_read" (func $read (param i32)))
              (import "aios" "return_json" (func $ret (param i32 i32)))
              (memory (export "memory") 1)
              (func (export "run")
                (call $read (i32.const 64))
                (call $ret (i32.const 64) (call $len))))
        "#;
        let args = json!({"to": "a@example.com", "tags": ["x", "y"]});
        assert_eq!(run(code, args.clone(), 8 << 20, 1000).await.unwrap(), args);
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let code =
            r#"(module (memory (export "memory") 1) (func (export "run") (loop $l (br $l))))"#;
        let started = std::time::Instant::now();
        let err = run(code, json!({}), 8 << 20, 100).await.unwrap_err();
        assert_eq!(err, RuntimeFault::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_memory_growth_past_ceiling() {
        let code = r#"
            (module
              (memory (export "memory") 1)
              (func (export "run") (drop (memory.grow (i32.const 512)))))
        "#;
        let err = run(code, json!({}), 8 << 20, 1000).await.unwrap_err();
        assert_eq!(err, RuntimeFault::MemoryExceeded);
    }

    #[tokio::test]
    async fn test_initial_memory_past_ceiling() {
        let code = r#"(module (memory (export "memory") 256) (func (export "run")))"#;
        let err = run(code, json!({}), 8 << 20, 1000).await.unwrap_err();
        assert_eq!(err, RuntimeFault::MemoryExceeded);
    }

    #[tokio::test]
    async fn test_memories_share_one_ceiling() {
        // 100 pages is 6.25 MiB; the second memory pushes the total past 8 MiB
        let code = r#"
            (module
              (memory (export "memory") 100)
              (memory 100)
              (func (export "run")))
        "#;
        let err = run(code, json!({}), 8 << 20, 1000).await.unwrap_err();
        assert_eq!(err, RuntimeFault::MemoryExceeded);
    }

    #[tokio::test]
    async fn test_table_growth_counts_against_ceiling() {
        let code = r#"
            (module
              (memory (export "memory") 1)
              (table 1 funcref)
              (func (export "run")
                (drop (table.grow (ref.null func) (i32.const 2000000)))))
        "#;
        let err = run(code, json!({}), 8 << 20, 1000).await.unwrap_err();
        assert_eq!(err, RuntimeFault::MemoryExceeded);
    }

    #[test]
    fn test_limiter_charges_running_total() {
        let mut limiter = CeilingLimiter::new(100);
        assert!(limiter.memory_growing(0, 60, None).unwrap());
        assert!(!limiter.memory_growing(0, 60, None).unwrap());
        assert!(limiter.exceeded);
        assert_eq!(limiter.used, 60);

        let mut limiter = CeilingLimiter::new(10 * TABLE_ELEMENT_BYTES);
        assert!(limiter.table_growing(0, 10, None).unwrap());
        assert!(!limiter.table_growing(10, 11, None).unwrap());
        assert!(!limiter.memory_growing(0, 1, Some(0)).unwrap());
    }

    #[tokio::test]
    async fn test_trap_is_reported() {
        let code = r#"(module (memory (export "memory") 1) (func (export "run") unreachable))"#;
        let err = run(code, json!({}), 8 << 20, 1000).await.unwrap_err();
        assert!(matches!(err, RuntimeFault::Trap(_)));
    }

    #[tokio::test]
    async fn test_compile_error() {
        let err = run("(module (func", json!({}), 8 << 20, 1000).await.unwrap_err();
        assert!(matches!(err, RuntimeFault::Compile(_)));
    }

    #[tokio::test]
    async fn test_unknown_import_is_rejected() {
        let code = r#"
            (module
              (import "wasi_snapshot_preview1" "fd_write" (func (param i32 i32 i32 i32) (result i32)))
              (memory (export "memory") 1)
              (func (export "run")))
        "#;
        let err = run(code, json!({}), 8 << 20, 1000).await.unwrap_err();
        assert!(matches!(err, RuntimeFault::Trap(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_result_is_a_fault() {
        let code = r#"
            (module
              (import "aios" "return_json" (func $ret (param i32 i32)))
              (memory (export "memory") 1)
              (data (i32.const 0) "{oops")
              (func (export "run") (call $ret (i32.const 0) (i32.const 5))))
        "#;
        let err = run(code, json!({}), 8 << 20, 1000).await.unwrap_err();
        assert!(matches!(err, RuntimeFault::Trap(msg) if msg.contains("invalid JSON")));
    }

    #[test]
    fn test_lookup_number_paths() {
        let args = json!({"n": 3, "nested": {"items": [1.5, 2]}, "flag": true, "s": "x"});
        assert_eq!(lookup_number(&args, "n"), Some(3.0));
        assert_eq!(lookup_number(&args, "nested.items.0"), Some(1.5));
        assert_eq!(lookup_number(&args, "flag"), Some(1.0));
        assert_eq!(lookup_number(&args, "s"), None);
        assert_eq!(lookup_number(&args, "missing"), None);
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(6.0), json!(6));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }
}
