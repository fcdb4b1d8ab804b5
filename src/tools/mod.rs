//! Tool registry and sandboxed execution.

pub mod sandbox;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub use sandbox::{CancellationToken, ToolSandbox, ToolSandboxConfig};

/// A registered tool. Handlers are identified only by name — no source
/// serialization of handler logic is permitted across an execution boundary.
///
/// `cancellation` is live for the duration of in-process execution; a
/// cooperative, long-running tool should poll `cancellation.is_cancelled()`
/// between steps of its own work and return early if it is set. It is
/// advisory only — a non-cooperative, compute-bound tool cannot be forced
/// to observe it.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> String;
    fn description(&self) -> String;
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value, cancellation: CancellationToken) -> anyhow::Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: RwLock::new(HashMap::new()) }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.write().await.insert(tool.name(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        self.tools.read().await.keys().cloned().collect()
    }
}
