//! World model: a bounded, sanitized snapshot of believed-true facts.

use crate::safety::unsafe_key::assert_safe_object;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

const MAX_FACT_DEPTH: usize = 10;
const MAX_KEY_LEN: usize = 256;
const MAX_STRING_LEN: usize = 10_000;
const MAX_FACTS: usize = 1_000;
const UNCERTAINTY_DECAY: f32 = 0.9;
const NO_PREDICTOR_UNCERTAINTY_RISE: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct WorldState {
    pub timestamp: i64,
    facts: HashMap<String, Value>,
    order: VecDeque<String>,
    pub uncertainty: f32,
}

impl WorldState {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp, facts: HashMap::new(), order: VecDeque::new(), uncertainty: 0.5 }
    }

    pub fn facts(&self) -> &HashMap<String, Value> {
        &self.facts
    }

    fn truncate_strings(value: Value, depth: usize) -> Value {
        match value {
            Value::String(s) if s.len() > MAX_STRING_LEN => Value::String(s.chars().take(MAX_STRING_LEN).collect()),
            Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Self::truncate_strings(v, depth + 1))).collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| Self::truncate_strings(v, depth + 1)).collect()),
            other => other,
        }
    }

    fn insert_fact(&mut self, key: String, value: Value) {
        if !self.facts.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.facts.insert(key, value);

        while self.facts.len() > MAX_FACTS {
            if let Some(oldest) = self.order.pop_front() {
                self.facts.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Merges a sanitized observation into the current facts and decays
    /// uncertainty toward zero. Rejects observations violating the
    /// unsafe-key, depth, or key-length invariants outright.
    pub fn merge_observation(&mut self, observation: &Value, now: i64) -> anyhow::Result<()> {
        assert_safe_object(observation, MAX_FACT_DEPTH)?;

        if let Value::Object(map) = observation {
            for (key, value) in map {
                if key.len() > MAX_KEY_LEN {
                    anyhow::bail!("Invalid fact key: exceeds maximum length {}", MAX_KEY_LEN);
                }
                let truncated = Self::truncate_strings(value.clone(), 0);
                self.insert_fact(key.clone(), truncated);
            }
        }

        self.timestamp = now;
        self.uncertainty = (self.uncertainty * UNCERTAINTY_DECAY).clamp(0.0, 1.0);
        Ok(())
    }

    /// Folds a completed action's resulting state back through the same
    /// merge-and-decay path as a normal observation; never fabricates an
    /// observation when the environment returned none.
    pub fn update_from_result(&mut self, result_state: Option<&Value>, now: i64) -> anyhow::Result<()> {
        match result_state {
            Some(state) => self.merge_observation(state, now),
            None => {
                self.timestamp = now;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub predicted_state: Value,
    pub uncertainty: f32,
}

#[async_trait]
pub trait Predictor: Send + Sync {
    fn matches(&self, action_type: &str) -> bool;
    async fn predict(&self, world: &WorldState, action: &Value) -> anyhow::Result<SimulationOutcome>;
}

/// Dispatches to the first matching registered predictor; absent a match,
/// returns the current state unchanged with uncertainty raised by a fixed step.
pub async fn simulate(
    world: &WorldState,
    action: &Value,
    action_type: &str,
    predictors: &[Box<dyn Predictor>],
) -> anyhow::Result<SimulationOutcome> {
    for predictor in predictors {
        if predictor.matches(action_type) {
            let outcome = predictor.predict(world, action).await?;
            if !(0.0..=1.0).contains(&outcome.uncertainty) {
                anyhow::bail!("Invalid predictor output: uncertainty out of [0,1]");
            }
            return Ok(outcome);
        }
    }

    Ok(SimulationOutcome {
        predicted_state: Value::Object(world.facts.clone().into_iter().collect()),
        uncertainty: (world.uncertainty + NO_PREDICTOR_UNCERTAINTY_RISE).min(1.0),
    })
}
