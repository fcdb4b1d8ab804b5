//! Request runner: authentication, tenant binding, scoped-memory selection,
//! and the deadline race around a single cognitive-cycle invocation.

use crate::audit::{AuditEvent, AuditEventType, AuditLogger};
use crate::cognition::goal::{Goal, GoalStack};
use crate::cognition::self_model::SelfModel;
use crate::cognition::world::WorldState;
use crate::config::Settings;
use crate::cycle::{AllowAllGate, CognitiveCycle, DryRunMode, PermissionGate, RunResult, RunStatus};
use crate::environment::{Environment, EpisodicEnvironment};
use crate::error::{CoreError, CoreResult};
use crate::llm::LlmClient;
use crate::memory::{MemoryManager, ScopedMemoryManager};
use crate::tools::{ToolRegistry, ToolSandbox, ToolSandboxConfig};
use crate::validation::OutputValidator;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Checks the `Authorization` header against the configured API key and
/// returns the authenticated principal's tenant id. `None` if no API key is
/// configured (auth not required). The shared-secret scheme has no
/// per-tenant key directory, so the verified token itself stands in for
/// the authenticated tenant identity.
pub fn authenticate(settings: &Settings, authorization_header: Option<&str>) -> CoreResult<Option<String>> {
    let Some(configured_key) = &settings.api_key else {
        return Ok(None);
    };

    let token = authorization_header
        .and_then(|h| h.strip_prefix("ApiKey ").or_else(|| h.strip_prefix("Bearer ")))
        .map(str::trim)
        .ok_or_else(|| CoreError::Permission("missing or malformed Authorization header".to_string()))?;

    if token != configured_key {
        return Err(CoreError::Permission("invalid API key".to_string()));
    }

    Ok(Some(token.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub observation: Value,
    pub goal: Option<Goal>,
    pub tenant_id: Option<String>,
    pub dry_run: Option<DryRunMode>,
    pub run_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub request_id: String,
    pub tenant_id: Option<String>,
    pub result: RunResult,
}

pub struct RequestRunner {
    pub settings: Arc<Settings>,
    pub memory: Arc<MemoryManager>,
    pub tool_registry: Arc<ToolRegistry>,
    pub llm: Arc<dyn LlmClient>,
    pub validator: Arc<OutputValidator>,
    pub audit: Arc<AuditLogger>,
    pub permission_gate: Arc<dyn PermissionGate>,
}

impl RequestRunner {
    pub fn new(
        settings: Arc<Settings>,
        memory: Arc<MemoryManager>,
        tool_registry: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        validator: Arc<OutputValidator>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self { settings, memory, tool_registry, llm, validator, audit, permission_gate: Arc::new(AllowAllGate) }
    }

    pub fn with_permission_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.permission_gate = gate;
        self
    }

    pub async fn run(&self, request: RunRequest, authorization_header: Option<&str>) -> CoreResult<RunOutcome> {
        let authenticated_tenant = authenticate(&self.settings, authorization_header)?;

        if let Some(claimed) = &request.tenant_id {
            match &authenticated_tenant {
                Some(authenticated) if claimed == authenticated => {}
                _ => return Err(CoreError::Permission("tenant mismatch".to_string())),
            }
        }

        let mut request_id = Uuid::new_v4().to_string();
        if Some(&request_id) == authenticated_tenant.as_ref() {
            request_id.push('r');
        }

        let persisting = authenticated_tenant.is_some();
        let scope = authenticated_tenant.clone().unwrap_or_else(|| request_id.clone());
        let scoped_memory = Arc::new(
            ScopedMemoryManager::new(scope, self.memory.clone(), persisting).map_err(CoreError::from)?,
        );

        let sandbox = Arc::new(
            ToolSandbox::new(self.tool_registry.clone(), ToolSandboxConfig::default()).map_err(CoreError::from)?,
        );
        let environment: Arc<dyn Environment> =
            Arc::new(EpisodicEnvironment::new(sandbox, request_id.clone(), request.observation.clone()));

        self.record(&request_id, &authenticated_tenant, AuditEventType::RunStart, serde_json::json!({})).await;

        let mut goal_stack = GoalStack::new();
        if let Some(goal) = request.goal {
            goal_stack.add(goal)?;
        }

        let mut cycle = CognitiveCycle {
            environment,
            memory: scoped_memory,
            llm: self.llm.clone(),
            validator: self.validator.clone(),
            permission_gate: self.permission_gate.clone(),
            audit: self.audit.clone(),
            world: WorldState::new(now_ms()),
            self_model: SelfModel::new(),
            goal_stack,
            predictors: Vec::new(),
            request_id: request_id.clone(),
            tenant_id: authenticated_tenant.clone(),
        };

        let timeout_ms = request.run_timeout_ms.unwrap_or(self.settings.run_once_timeout_ms);

        self.record(&request_id, &authenticated_tenant, AuditEventType::RunProgress, serde_json::json!({"stage": "cycle_start"}))
            .await;

        let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), cycle.run_once(request.dry_run)).await
        {
            Ok(result) => result,
            Err(_) => RunResult {
                status: RunStatus::Error,
                decision: None,
                action_result: None,
                selected_goal_id: None,
                state_trace: Vec::new(),
                dry_run_mode: None,
                error: Some(format!("timed out after {} ms", timeout_ms)),
                duration_ms: timeout_ms,
            },
        };

        self.record(
            &request_id,
            &authenticated_tenant,
            AuditEventType::RunComplete,
            serde_json::json!({"status": format!("{:?}", result.status)}),
        )
        .await;

        Ok(RunOutcome { request_id, tenant_id: authenticated_tenant, result })
    }

    async fn record(&self, request_id: &str, tenant_id: &Option<String>, event_type: AuditEventType, data: Value) {
        let mut event = AuditEvent::new(now_ms(), request_id, event_type, data);
        if let Some(tenant) = tenant_id {
            event = event.with_tenant(tenant.clone());
        }
        self.audit.record(event).await;
    }
}
