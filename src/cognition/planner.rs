//! Heuristic planner: turns a goal's candidate actions into a scored plan.

use crate::cognition::goal::Goal;
use crate::cognition::world::{simulate, Predictor, WorldState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal_id: String,
    pub created_at: i64,
    pub steps: Vec<PlanStep>,
}

pub struct Planner;

impl Planner {
    /// Scores every candidate action by simulating it against the current
    /// world model (lower predicted uncertainty scores higher) and keeps
    /// only the winning step. An empty candidate list yields an empty plan.
    pub async fn plan(
        goal: &Goal,
        plan_id: impl Into<String>,
        world: &WorldState,
        predictors: &[Box<dyn Predictor>],
        now: i64,
    ) -> anyhow::Result<Plan> {
        let mut best: Option<(f32, PlanStep)> = None;

        for (i, action_type) in goal.candidate_actions.iter().flatten().enumerate() {
            let action_value = serde_json::json!({ "type": action_type });
            let outcome = simulate(world, &action_value, action_type, predictors).await?;
            let score = 1.0 - outcome.uncertainty;

            let step = PlanStep {
                id: format!("{}-step-{}", goal.id, i),
                description: format!("Take action '{}' toward goal '{}'", action_type, goal.title),
                action: Action { action_type: action_type.clone(), payload: None },
            };

            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, step));
            }
        }

        Ok(Plan {
            id: plan_id.into(),
            goal_id: goal.id.clone(),
            created_at: now,
            steps: best.into_iter().map(|(_, step)| step).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::goal::Horizon;
    use crate::cognition::world::{Predictor, SimulationOutcome, WorldState};
    use async_trait::async_trait;

    struct FixedPredictor {
        action: &'static str,
        uncertainty: f32,
    }

    #[async_trait]
    impl Predictor for FixedPredictor {
        fn matches(&self, action_type: &str) -> bool {
            action_type == self.action
        }
        async fn predict(&self, _world: &WorldState, _action: &Value) -> anyhow::Result<SimulationOutcome> {
            Ok(SimulationOutcome { predicted_state: serde_json::json!({}), uncertainty: self.uncertainty })
        }
    }

    #[tokio::test]
    async fn test_plan_picks_lowest_uncertainty_candidate() {
        let mut goal = Goal::new("g1", "ship it", 1.0, Horizon::Short, 0);
        goal.candidate_actions = Some(vec!["risky".to_string(), "safe".to_string()]);

        let world = WorldState::new(0);
        let predictors: Vec<Box<dyn Predictor>> = vec![
            Box::new(FixedPredictor { action: "risky", uncertainty: 0.9 }),
            Box::new(FixedPredictor { action: "safe", uncertainty: 0.1 }),
        ];

        let plan = Planner::plan(&goal, "plan-1", &world, &predictors, 0).await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].action.action_type, "safe");
    }

    #[tokio::test]
    async fn test_empty_candidates_yields_empty_plan() {
        let goal = Goal::new("g1", "ship it", 1.0, Horizon::Short, 0);
        let world = WorldState::new(0);
        let predictors: Vec<Box<dyn Predictor>> = Vec::new();
        let plan = Planner::plan(&goal, "plan-1", &world, &predictors, 0).await.unwrap();
        assert!(plan.steps.is_empty());
    }
}
