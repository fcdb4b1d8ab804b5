//! Self model: a running estimate of this agent's own reliability.

use std::collections::HashSet;

const RELIABILITY_UP: f32 = 0.03;
const RELIABILITY_DOWN: f32 = 0.08;
const CONFIDENCE_UP: f32 = 0.02;
const CONFIDENCE_DOWN: f32 = 0.10;

#[derive(Debug, Clone)]
pub struct SelfModel {
    pub capabilities: HashSet<String>,
    pub tools: HashSet<String>,
    pub reliability: f32,
    pub confidence: f32,
    pub successes: u64,
    pub failures: u64,
}

impl Default for SelfModel {
    fn default() -> Self {
        Self {
            capabilities: HashSet::new(),
            tools: HashSet::new(),
            reliability: 0.5,
            confidence: 0.5,
            successes: 0,
            failures: 0,
        }
    }
}

impl SelfModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjusts reliability and confidence in fixed, asymmetric steps: a
    /// success nudges both up gently; a failure pulls both down harder.
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.successes += 1;
            self.reliability = (self.reliability + RELIABILITY_UP).clamp(0.0, 1.0);
            self.confidence = (self.confidence + CONFIDENCE_UP).clamp(0.0, 1.0);
        } else {
            self.failures += 1;
            self.reliability = (self.reliability - RELIABILITY_DOWN).clamp(0.0, 1.0);
            self.confidence = (self.confidence - CONFIDENCE_DOWN).clamp(0.0, 1.0);
        }
    }
}
