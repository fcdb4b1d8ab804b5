//! Environment boundary: how a run observes the world and acts on it.

use crate::cognition::planner::Action;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ActionResult {
    pub success: bool,
    pub state: Option<Value>,
    pub summary: String,
}

#[async_trait]
pub trait Environment: Send + Sync {
    async fn observe(&self) -> anyhow::Result<Value>;
    async fn act(&self, action: &Action) -> anyhow::Result<ActionResult>;
}

/// An environment backed by the tool sandbox: `act` dispatches the
/// action's type as a tool name through the sandbox.
pub struct EpisodicEnvironment {
    sandbox: std::sync::Arc<crate::tools::ToolSandbox>,
    request_id: String,
    initial_observation: Value,
}

impl EpisodicEnvironment {
    pub fn new(sandbox: std::sync::Arc<crate::tools::ToolSandbox>, request_id: impl Into<String>, initial_observation: Value) -> Self {
        Self { sandbox, request_id: request_id.into(), initial_observation }
    }
}

#[async_trait]
impl Environment for EpisodicEnvironment {
    async fn observe(&self) -> anyhow::Result<Value> {
        Ok(self.initial_observation.clone())
    }

    async fn act(&self, action: &Action) -> anyhow::Result<ActionResult> {
        let input = action.payload.clone().unwrap_or(Value::Object(serde_json::Map::new()));
        match self.sandbox.dispatch(&action.action_type, input, &self.request_id).await {
            Ok(result) => Ok(ActionResult {
                success: true,
                state: Some(result.clone()),
                summary: format!("Action {} => success", action.action_type),
            }),
            Err(e) => Ok(ActionResult {
                success: false,
                state: None,
                summary: format!("Action {} => failure: {}", action.action_type, e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolRegistry, ToolSandboxConfig};
    use async_trait::async_trait as at;
    use serde_json::json;
    use std::sync::Arc;

    struct NoopTool;

    #[at]
    impl Tool for NoopTool {
        fn name(&self) -> String {
            "noop".to_string()
        }
        fn description(&self) -> String {
            "does nothing".to_string()
        }
        fn parameters(&self) -> Value {
            json!({})
        }
        async fn execute(&self, _input: Value, _cancellation: crate::tools::CancellationToken) -> anyhow::Result<Value> {
            Ok(json!({"ok": true}))
        }
    }

    #[tokio::test]
    async fn test_act_reports_success_on_known_tool() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(NoopTool)).await;
        let sandbox = Arc::new(crate::tools::ToolSandbox::new(registry, ToolSandboxConfig::default()).unwrap());
        let env = EpisodicEnvironment::new(sandbox, "req-1", json!({}));

        let action = Action { action_type: "noop".to_string(), payload: None };
        let result = env.act(&action).await.unwrap();
        assert!(result.success);
        assert!(result.summary.contains("success"));
    }

    #[tokio::test]
    async fn test_act_reports_failure_on_unknown_tool() {
        let registry = Arc::new(ToolRegistry::new());
        let sandbox = Arc::new(crate::tools::ToolSandbox::new(registry, ToolSandboxConfig::default()).unwrap());
        let env = EpisodicEnvironment::new(sandbox, "req-1", json!({}));

        let action = Action { action_type: "missing".to_string(), payload: None };
        let result = env.act(&action).await.unwrap();
        assert!(!result.success);
        assert!(result.summary.contains("failure"));
    }
}
