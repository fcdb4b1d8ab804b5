//! Goal stack: the set of objectives a run is actively pursuing.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Horizon {
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalStatus {
    Active,
    Completed,
    Failed,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: f32,
    pub horizon: Horizon,
    pub status: GoalStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub candidate_actions: Option<Vec<String>>,
}

impl Goal {
    pub fn new(id: impl Into<String>, title: impl Into<String>, priority: f32, horizon: Horizon, now: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            priority: priority.max(0.0),
            horizon,
            status: GoalStatus::Active,
            created_at: now,
            updated_at: now,
            candidate_actions: None,
        }
    }
}

/// Ordered goal list. Insertion order is preserved so priority ties
/// resolve deterministically to "first added wins".
#[derive(Debug, Clone, Default)]
pub struct GoalStack {
    goals: Vec<Goal>,
}

impl GoalStack {
    pub fn new() -> Self {
        Self { goals: Vec::new() }
    }

    /// Rejects a duplicate id as a conflict (surfaced as 409 at the HTTP boundary).
    pub fn add(&mut self, goal: Goal) -> CoreResult<()> {
        if self.goals.iter().any(|g| g.id == goal.id) {
            return Err(CoreError::Conflict(format!("duplicate goal id '{}'", goal.id)));
        }
        self.goals.push(goal);
        Ok(())
    }

    pub fn active_goals(&self) -> Vec<&Goal> {
        self.goals.iter().filter(|g| g.status == GoalStatus::Active).collect()
    }

    /// Highest-priority active goal; ties broken by insertion order (the
    /// first-added goal among equal priorities wins).
    pub fn resolve_next_goal(&self) -> Option<&Goal> {
        self.goals
            .iter()
            .filter(|g| g.status == GoalStatus::Active)
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.priority
                    .partial_cmp(&b.priority)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(_, g)| g)
    }

    pub fn mark_completed(&mut self, id: &str, now: i64) {
        self.set_status(id, GoalStatus::Completed, now);
    }

    pub fn mark_failed(&mut self, id: &str, now: i64) {
        self.set_status(id, GoalStatus::Failed, now);
    }

    fn set_status(&mut self, id: &str, status: GoalStatus, now: i64) {
        if let Some(goal) = self.goals.iter_mut().find(|g| g.id == id) {
            goal.status = status;
            goal.updated_at = now;
        }
    }

    pub fn get(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn all(&self) -> &[Goal] {
        &self.goals
    }
}
