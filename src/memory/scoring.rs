//! Hybrid memory scoring: similarity × time-decay × goal-relevance.

use crate::cognition::goal::Goal;
use std::collections::HashSet;

pub const DEFAULT_SIMILARITY_WEIGHT: f32 = 0.6;
pub const DEFAULT_DECAY_WEIGHT: f32 = 0.2;
pub const DEFAULT_RELEVANCE_WEIGHT: f32 = 0.2;
pub const DEFAULT_HALF_LIFE_MS: i64 = 7 * 24 * 3600 * 1000;

#[derive(Debug, Clone)]
pub struct ScoreWeights {
    pub similarity: f32,
    pub decay: f32,
    pub relevance: f32,
    pub half_life_ms: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            similarity: DEFAULT_SIMILARITY_WEIGHT,
            decay: DEFAULT_DECAY_WEIGHT,
            relevance: DEFAULT_RELEVANCE_WEIGHT,
            half_life_ms: DEFAULT_HALF_LIFE_MS,
        }
    }
}

/// Lowercased, non-alphanumeric-split tokens of length >= 2.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Jaccard similarity between two token sets: |A ∩ B| / |A ∪ B|.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Best Jaccard-style token overlap of `content` against any of `goals`'
/// title+description tokens. Zero when `goals` is empty.
pub fn goal_relevance(content: &str, goals: &[Goal]) -> f32 {
    let content_tokens = tokenize(content);
    goals
        .iter()
        .map(|g| {
            let mut goal_text = g.title.clone();
            if let Some(desc) = &g.description {
                goal_text.push(' ');
                goal_text.push_str(desc);
            }
            jaccard(&content_tokens, &tokenize(&goal_text))
        })
        .fold(0.0_f32, f32::max)
}

/// `exp(-age/halfLife)`, clamped implicitly to (0, 1] by construction.
pub fn time_decay(age_ms: i64, half_life_ms: i64) -> f32 {
    if half_life_ms <= 0 {
        return 0.0;
    }
    let ratio = age_ms as f64 / half_life_ms as f64;
    (-ratio).exp() as f32
}

#[derive(Debug, Clone)]
pub struct ScoreComponents {
    pub similarity: f32,
    pub time_decay: f32,
    pub goal_relevance: f32,
    pub score: f32,
}

pub fn combine(similarity: f32, time_decay: f32, goal_relevance: f32, weights: &ScoreWeights) -> ScoreComponents {
    let score = weights.similarity * similarity + weights.decay * time_decay + weights.relevance * goal_relevance;
    ScoreComponents { similarity, time_decay, goal_relevance, score }
}
