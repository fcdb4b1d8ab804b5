//! The cognitive cycle: a single-pass state machine driving one run.

use crate::audit::{AuditEvent, AuditEventType, AuditLogger};
use crate::cognition::goal::{Goal, GoalStack};
use crate::cognition::planner::{Action, Planner};
use crate::cognition::self_model::SelfModel;
use crate::cognition::world::{Predictor, WorldState};
use crate::environment::{ActionResult, Environment};
use crate::llm::LlmClient;
use crate::memory::{MemoryItemMetadata, QueryOptions, ScopedMemoryManager};
use crate::safety::content_filter::sanitize;
use crate::validation::OutputValidator;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Observe,
    RetrieveMemory,
    UpdateWorld,
    UpdateSelf,
    PlanGoals,
    Simulate,
    QueryLlm,
    ValidateOutput,
    Act,
    StoreResults,
    Learn,
    Complete,
    Error,
    Idle,
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DryRunMode {
    WithLlm,
    WithoutLlm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Idle,
    DryRun,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub action_type: String,
    pub action_payload: Option<Value>,
    pub confidence: Option<f32>,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub status: RunStatus,
    pub decision: Option<Decision>,
    pub action_result: Option<ActionResultView>,
    pub selected_goal_id: Option<String>,
    pub state_trace: Vec<CycleState>,
    pub dry_run_mode: Option<DryRunMode>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResultView {
    pub success: bool,
    pub summary: String,
}

impl From<ActionResult> for ActionResultView {
    fn from(r: ActionResult) -> Self {
        Self { success: r.success, summary: r.summary }
    }
}

/// Consulted before executing the chosen action. Modeled as a capability
/// rather than a concrete policy engine, since the concrete policy is an
/// external collaborator.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn is_allowed(&self, action: &Action, goal_id: Option<&str>) -> (bool, Option<String>);
}

pub struct AllowAllGate;

#[async_trait]
impl PermissionGate for AllowAllGate {
    async fn is_allowed(&self, _action: &Action, _goal_id: Option<&str>) -> (bool, Option<String>) {
        (true, None)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct CognitiveCycle {
    pub environment: Arc<dyn Environment>,
    pub memory: Arc<ScopedMemoryManager>,
    pub llm: Arc<dyn LlmClient>,
    pub validator: Arc<OutputValidator>,
    pub permission_gate: Arc<dyn PermissionGate>,
    pub audit: Arc<AuditLogger>,
    pub world: WorldState,
    pub self_model: SelfModel,
    pub goal_stack: GoalStack,
    pub predictors: Vec<Box<dyn Predictor>>,
    pub request_id: String,
    pub tenant_id: Option<String>,
}

impl CognitiveCycle {
    fn audit_event(&self, event_type: AuditEventType, data: Value) -> AuditEvent {
        let event = AuditEvent::new(now_ms(), &self.request_id, event_type, data);
        match &self.tenant_id {
            Some(t) => event.with_tenant(t.clone()),
            None => event,
        }
    }

    pub async fn run_once(&mut self, dry_run: Option<DryRunMode>) -> RunResult {
        let start = Instant::now();
        let mut trace = Vec::new();

        match self.run_once_inner(dry_run, &mut trace).await {
            Ok(mut result) => {
                result.state_trace = trace;
                result.duration_ms = start.elapsed().as_millis() as u64;
                result
            }
            Err(e) => {
                trace.push(CycleState::Error);
                error!(request_id = %self.request_id, error = %e, "cognitive cycle failed");
                self.audit
                    .record(self.audit_event(AuditEventType::Error, serde_json::json!({"message": e.to_string()})))
                    .await;
                RunResult {
                    status: RunStatus::Error,
                    decision: None,
                    action_result: None,
                    selected_goal_id: None,
                    state_trace: trace,
                    dry_run_mode: None,
                    error: Some(e.to_string()),
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        }
    }

    async fn run_once_inner(&mut self, dry_run: Option<DryRunMode>, trace: &mut Vec<CycleState>) -> Result<RunResult> {
        trace.push(CycleState::Observe);
        let observation = self.environment.observe().await?;

        trace.push(CycleState::RetrieveMemory);
        let obs_text = serde_json::to_string(&observation)?;
        let sanitized = sanitize(&obs_text);
        if sanitized.flagged {
            let message = format!("Prompt injection detected: {}", sanitized.reasons.join(", "));
            self.audit
                .record(self.audit_event(AuditEventType::Error, serde_json::json!({"message": message})))
                .await;
            bail!(message);
        }
        let sanitized_observation: Value = serde_json::from_str(&sanitized.sanitized)?;

        let active_goals: Vec<Goal> = self.goal_stack.active_goals().into_iter().cloned().collect();
        let memory_context = self
            .memory
            .inject_for_prompt(&sanitized.sanitized, QueryOptions { limit: 5, goals: active_goals, ..Default::default() })
            .await?;

        trace.push(CycleState::UpdateWorld);
        let now = now_ms();
        self.world.merge_observation(&sanitized_observation, now)?;
        trace.push(CycleState::UpdateSelf);

        trace.push(CycleState::PlanGoals);
        let mut goal = match self.goal_stack.resolve_next_goal() {
            Some(g) => g.clone(),
            None => {
                return Ok(RunResult {
                    status: RunStatus::Idle,
                    decision: None,
                    action_result: None,
                    selected_goal_id: None,
                    state_trace: Vec::new(),
                    dry_run_mode: None,
                    error: None,
                    duration_ms: 0,
                })
            }
        };

        if goal.candidate_actions.as_ref().map(|c| c.is_empty()).unwrap_or(true) {
            goal.candidate_actions = Some(vec!["pursue_goal".to_string()]);
        }

        trace.push(CycleState::Simulate);
        let plan = Planner::plan(&goal, format!("plan-{}", self.request_id), &self.world, &self.predictors, now).await?;
        if !plan.steps.is_empty() {
            let summary = serde_json::to_string(&plan.steps).unwrap_or_default();
            if let Err(e) = self
                .memory
                .add_procedural(
                    format!("plan-{}", self.request_id),
                    format!("Plan for goal '{}': {} step(s)", goal.title, plan.steps.len()),
                    summary,
                    0.5,
                    MemoryItemMetadata { goal_id: Some(goal.id.clone()), ..Default::default() },
                )
                .await
            {
                warn!("Failed to persist plan as procedural memory: {}", e);
            }
        }

        trace.push(CycleState::QueryLlm);
        let goal_fragment = sanitize(&format!("{}\n{}", goal.title, goal.description.clone().unwrap_or_default())).sanitized;
        let memory_fragment = sanitize(&memory_context).sanitized;
        let plan_fragment = sanitize(&serde_json::to_string(&plan.steps).unwrap_or_default()).sanitized;
        let system_prompt = format!(
            "You are an autonomous agent pursuing a goal.\nGoal: {}\nRelevant memory:\n{}\nCurrent plan:\n{}",
            goal_fragment, memory_fragment, plan_fragment
        );

        if matches!(dry_run, Some(DryRunMode::WithoutLlm)) {
            let decision = Decision {
                action_type: "pursue_goal".to_string(),
                action_payload: Some(serde_json::json!({"goalId": goal.id})),
                confidence: None,
                reasoning: Some("Dry run: LLM not invoked".to_string()),
            };
            return Ok(RunResult {
                status: RunStatus::DryRun,
                decision: Some(decision),
                action_result: None,
                selected_goal_id: Some(goal.id.clone()),
                state_trace: Vec::new(),
                dry_run_mode: Some(DryRunMode::WithoutLlm),
                error: None,
                duration_ms: 0,
            });
        }

        let raw_response = self.llm.generate(&sanitized.sanitized, Some(&system_prompt)).await?;

        trace.push(CycleState::ValidateOutput);
        let outcome = self.validator.validate(&raw_response);
        if !outcome.success {
            bail!("Invalid LLM output: {}", outcome.errors.join("; "));
        }
        let decision = parse_decision(outcome.data.expect("validated output always carries data"))?;

        if matches!(dry_run, Some(DryRunMode::WithLlm)) {
            return Ok(RunResult {
                status: RunStatus::DryRun,
                decision: Some(decision),
                action_result: None,
                selected_goal_id: Some(goal.id.clone()),
                state_trace: Vec::new(),
                dry_run_mode: Some(DryRunMode::WithLlm),
                error: None,
                duration_ms: 0,
            });
        }

        let action = Action { action_type: decision.action_type.clone(), payload: decision.action_payload.clone() };
        let (allowed, reason) = self.permission_gate.is_allowed(&action, Some(&goal.id)).await;
        if !allowed {
            bail!("Action not permitted: {}", reason.unwrap_or_else(|| "denied by permission gate".to_string()));
        }

        trace.push(CycleState::Act);
        let action_result = self.environment.act(&action).await?;
        self.world.update_from_result(action_result.state.as_ref(), now_ms())?;

        trace.push(CycleState::StoreResults);
        let outcome_word = if action_result.success { "success" } else { "failure" };
        if let Err(e) = self
            .memory
            .add_episodic(
                format!("action-{}", self.request_id),
                format!("Action {} => {}", action.action_type, outcome_word),
                "action_result".to_string(),
                MemoryItemMetadata { goal_id: Some(goal.id.clone()), ..Default::default() },
            )
            .await
        {
            warn!("Failed to persist action outcome as episodic memory: {}", e);
        }

        trace.push(CycleState::Learn);
        self.self_model.record_outcome(action_result.success);
        if action_result.success {
            self.goal_stack.mark_completed(&goal.id, now_ms());
        } else {
            self.goal_stack.mark_failed(&goal.id, now_ms());
        }

        trace.push(CycleState::Complete);
        Ok(RunResult {
            status: RunStatus::Completed,
            decision: Some(decision),
            action_result: Some(action_result.into()),
            selected_goal_id: Some(goal.id),
            state_trace: Vec::new(),
            dry_run_mode: None,
            error: None,
            duration_ms: 0,
        })
    }
}

fn parse_decision(value: Value) -> Result<Decision> {
    let decision: Decision = serde_json::from_value(value)?;
    if decision.action_type.is_empty() {
        bail!("Invalid decision: actionType must not be empty");
    }
    if let Some(confidence) = decision.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            bail!("Invalid decision: confidence out of [0,1]");
        }
    }
    Ok(decision)
}
