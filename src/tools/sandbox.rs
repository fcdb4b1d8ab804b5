//! Tool sandbox: dispatch, timeout racing, and worker isolation.
//!
//! Generalizes this codebase's `ToolRegistry::execute` (cache lookup then
//! direct `tool.execute(params).await`, no timeout, no isolation) with the
//! hard-kill and structured-clone-compatibility guarantees. Isolated
//! execution is grounded on `server.rs`'s abort-then-restart pattern
//! (`AbortHandle` stored alongside the spawned task, `.abort()` on timeout).

use super::ToolRegistry;
use crate::safety::unsafe_key::{assert_safe_object, DEFAULT_MAX_DEPTH};
use anyhow::{bail, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A cooperative cancellation flag passed to tools alongside their input.
/// A non-cooperative, compute-bound tool cannot be forcibly stopped this way.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ToolSandboxConfig {
    pub timeout_ms: u64,
    pub use_worker_isolation: bool,
    pub require_isolation: bool,
}

impl Default for ToolSandboxConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000, use_worker_isolation: false, require_isolation: false }
    }
}

pub struct ToolSandbox {
    registry: Arc<ToolRegistry>,
    config: ToolSandboxConfig,
}

/// Rejects non-finite floats and oversized string leaves — the closest
/// analogue, in a JSON payload, to "functions/symbols/BigInts are not
/// structured-clone compatible".
fn assert_clone_compatible(value: &Value, max_string_len: usize, path: &mut Vec<String>) -> Result<()> {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    bail!("Payload not transferable at '{}': non-finite number", path.join("."));
                }
            }
        }
        Value::String(s) if s.len() > max_string_len => {
            bail!("Payload not transferable at '{}': string exceeds {} bytes", path.join("."), max_string_len);
        }
        Value::Object(map) => {
            for (k, v) in map {
                path.push(k.clone());
                assert_clone_compatible(v, max_string_len, path)?;
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                path.push(i.to_string());
                assert_clone_compatible(v, max_string_len, path)?;
                path.pop();
            }
        }
        _ => {}
    }
    Ok(())
}

impl ToolSandbox {
    pub fn new(registry: Arc<ToolRegistry>, config: ToolSandboxConfig) -> Result<Self> {
        if config.require_isolation && !config.use_worker_isolation {
            bail!("Invalid sandbox configuration: requireIsolation requires useWorkerIsolation");
        }
        Ok(Self { registry, config })
    }

    /// Dispatches `tool_name` with `input`, racing the tool's future
    /// against the configured timeout. Input and output both pass the
    /// unsafe-key assertion.
    pub async fn dispatch(&self, tool_name: &str, input: Value, request_id: &str) -> Result<Value> {
        assert_safe_object(&input, DEFAULT_MAX_DEPTH)?;

        let tool = match self.registry.get(tool_name).await {
            Some(t) => t,
            None => bail!("Tool not permitted: '{}'", tool_name),
        };

        let output = if self.config.use_worker_isolation {
            self.execute_isolated(tool, input, request_id).await?
        } else {
            self.execute_in_process(tool, input).await?
        };

        assert_safe_object(&output, DEFAULT_MAX_DEPTH)?;
        Ok(output)
    }

    /// Runs the tool on its own task so that, on timeout, the tool keeps
    /// running after `dispatch` returns its error — given only the
    /// cancellation token it was handed, not hard-terminated like isolated
    /// execution. A cooperative tool notices the token and exits on its
    /// own; a non-cooperative, compute-bound one simply keeps running
    /// until it finishes (or the process ends).
    async fn execute_in_process(&self, tool: Arc<dyn super::Tool>, input: Value) -> Result<Value> {
        let cancellation = CancellationToken::new();
        let tool_for_task = tool.clone();
        let cancellation_for_task = cancellation.clone();
        let handle = tokio::spawn(async move { tool_for_task.execute(input, cancellation_for_task).await });

        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => bail!("Tool '{}' panicked: {}", tool.name(), join_err),
            Err(_) => {
                cancellation.cancel();
                bail!("Tool '{}' timed out after {} ms", tool.name(), self.config.timeout_ms)
            }
        }
    }

    /// Runs the tool on a separate task so the parent can hard-terminate
    /// it via `AbortHandle` on timeout, rather than merely flipping a
    /// cooperative cancellation flag.
    async fn execute_isolated(&self, tool: Arc<dyn super::Tool>, input: Value, request_id: &str) -> Result<Value> {
        assert_clone_compatible(&input, 10 * 1024 * 1024, &mut Vec::new())?;

        let request_id = request_id.to_string();
        let tool_name = tool.name();
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(async move { tool.execute(input, cancellation).await });
        let abort_handle = handle.abort_handle();

        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => bail!("Tool '{}' (request {}) panicked: {}", tool_name, request_id, join_err),
            Err(_) => {
                abort_handle.abort();
                bail!("Tool '{}' (request {}) timed out after {} ms", tool_name, request_id, self.config.timeout_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::sleep;

    struct EchoTool;

    #[async_trait]
    impl super::super::Tool for EchoTool {
        fn name(&self) -> String {
            "echo".to_string()
        }
        fn description(&self) -> String {
            "echoes its input".to_string()
        }
        fn parameters(&self) -> Value {
            json!({})
        }
        async fn execute(&self, input: Value, _cancellation: CancellationToken) -> Result<Value> {
            Ok(input)
        }
    }

    struct SlowTool;

    #[async_trait]
    impl super::super::Tool for SlowTool {
        fn name(&self) -> String {
            "slow".to_string()
        }
        fn description(&self) -> String {
            "never returns in time".to_string()
        }
        fn parameters(&self) -> Value {
            json!({})
        }
        async fn execute(&self, _input: Value, _cancellation: CancellationToken) -> Result<Value> {
            sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }
    }

    async fn registry_with(tool: Arc<dyn super::super::Tool>) -> Arc<ToolRegistry> {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(tool).await;
        registry
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_with_not_permitted() {
        let registry = Arc::new(ToolRegistry::new());
        let sandbox = ToolSandbox::new(registry, ToolSandboxConfig::default()).unwrap();
        let err = sandbox.dispatch("nonexistent", json!({}), "req-1").await.unwrap_err();
        assert!(err.to_string().contains("Tool not permitted"));
    }

    #[tokio::test]
    async fn test_in_process_dispatch_returns_output() {
        let registry = registry_with(Arc::new(EchoTool)).await;
        let sandbox = ToolSandbox::new(registry, ToolSandboxConfig::default()).unwrap();
        let result = sandbox.dispatch("echo", json!({"a": 1}), "req-1").await.unwrap();
        assert_eq!(result["a"], 1);
    }

    #[tokio::test]
    async fn test_in_process_timeout_fires() {
        let registry = registry_with(Arc::new(SlowTool)).await;
        let sandbox =
            ToolSandbox::new(registry, ToolSandboxConfig { timeout_ms: 20, ..ToolSandboxConfig::default() }).unwrap();
        let err = sandbox.dispatch("slow", json!({}), "req-1").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    /// A cooperative tool that polls its cancellation token and records
    /// whether it ever observed it set.
    struct WatchesCancellationTool(Arc<AtomicBool>);

    #[async_trait]
    impl super::super::Tool for WatchesCancellationTool {
        fn name(&self) -> String {
            "watcher".to_string()
        }
        fn description(&self) -> String {
            "polls its cancellation token until it's set".to_string()
        }
        fn parameters(&self) -> Value {
            json!({})
        }
        async fn execute(&self, _input: Value, cancellation: CancellationToken) -> Result<Value> {
            loop {
                if cancellation.is_cancelled() {
                    self.0.store(true, Ordering::SeqCst);
                    return Ok(json!({"cancelled": true}));
                }
                sleep(Duration::from_millis(5)).await;
            }
        }
    }

    #[tokio::test]
    async fn test_in_process_timeout_fires_the_token_the_tool_receives() {
        let observed = Arc::new(AtomicBool::new(false));
        let registry = registry_with(Arc::new(WatchesCancellationTool(observed.clone()))).await;
        let sandbox =
            ToolSandbox::new(registry, ToolSandboxConfig { timeout_ms: 20, ..ToolSandboxConfig::default() }).unwrap();
        let err = sandbox.dispatch("watcher", json!({}), "req-1").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        // The tool's task keeps running after dispatch returns its error;
        // give it one more tick to notice cancellation and exit.
        sleep(Duration::from_millis(20)).await;
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_isolated_timeout_aborts_worker() {
        let registry = registry_with(Arc::new(SlowTool)).await;
        let sandbox = ToolSandbox::new(
            registry,
            ToolSandboxConfig { timeout_ms: 20, use_worker_isolation: true, ..ToolSandboxConfig::default() },
        )
        .unwrap();
        let err = sandbox.dispatch("slow", json!({}), "req-1").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_unsafe_key_input_is_rejected() {
        let registry = registry_with(Arc::new(EchoTool)).await;
        let sandbox = ToolSandbox::new(registry, ToolSandboxConfig::default()).unwrap();
        let err = sandbox.dispatch("echo", json!({"__proto__": {}}), "req-1").await.unwrap_err();
        assert!(err.to_string().contains("unsafe key"));
    }

    #[test]
    fn test_require_isolation_without_worker_isolation_rejected_at_construction() {
        let registry = Arc::new(ToolRegistry::new());
        let config = ToolSandboxConfig { require_isolation: true, use_worker_isolation: false, ..ToolSandboxConfig::default() };
        assert!(ToolSandbox::new(registry, config).is_err());
    }
}
