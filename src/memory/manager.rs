//! Memory manager: add* / query / injectForPrompt.
//!
//! Generalizes this codebase's `MemoryManager` (resource-aware wrapper
//! around a single `Memory` trait object) into the write/query pipeline the
//! cognitive cycle drives: embed, upsert into the vector store, save to the
//! repository, with best-effort vector rollback on repository failure.

use super::embedding::EmbeddingProvider;
use super::entry::{MemoryItem, MemoryItemMetadata};
use super::repository::MemoryRepository;
use super::scoring::{self, ScoreWeights};
use super::vector::{MetadataFilter, MetadataValue, VectorRecord, VectorStore};
use crate::cognition::goal::Goal;
use anyhow::{bail, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Consulted before a write is accepted; a denial aborts the write.
/// Named as a capability, not a concrete type, per the "dynamic dispatch"
/// design note — collaborators are modeled as trait objects, not a class
/// hierarchy.
#[async_trait::async_trait]
pub trait PoisoningGuard: Send + Sync {
    async fn check(&self, content: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub limit: usize,
    pub scope: Option<String>,
    pub types: Vec<String>,
    pub goals: Vec<Goal>,
}

impl QueryOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, ..Default::default() }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub memory: MemoryItem,
    pub similarity: f32,
    pub time_decay: f32,
    pub goal_relevance: f32,
    pub score: f32,
}

pub fn default_query_limit() -> usize {
    5
}

/// `"<scope>:<localId>"` -> `(Some(scope), localId)`. An id with no `:`
/// returns `(None, id)`.
pub fn split_scope(id: &str) -> (Option<String>, String) {
    match id.split_once(':') {
        Some((scope, local)) if !scope.is_empty() => (Some(scope.to_string()), local.to_string()),
        _ => (None, id.to_string()),
    }
}

pub struct MemoryManager {
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    repository: Arc<dyn MemoryRepository>,
    poisoning_guard: Option<Arc<dyn PoisoningGuard>>,
    weights: ScoreWeights,
}

impl MemoryManager {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        repository: Arc<dyn MemoryRepository>,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            repository,
            poisoning_guard: None,
            weights: ScoreWeights::default(),
        }
    }

    pub fn with_poisoning_guard(mut self, guard: Arc<dyn PoisoningGuard>) -> Self {
        self.poisoning_guard = Some(guard);
        self
    }

    async fn write(&self, item: MemoryItem) -> Result<String> {
        if item.content().is_empty() {
            bail!("Invalid content: memory content must not be empty");
        }

        if let Some(guard) = &self.poisoning_guard {
            guard.check(item.content()).await?;
        }

        let vector = self.embedder.embed(item.content()).await?;

        let (scope, _local) = split_scope(item.id());
        let mut metadata: HashMap<String, MetadataValue> = HashMap::new();
        metadata.insert("type".to_string(), MetadataValue::Single(item.kind_str().to_string()));
        if let Some(goal_id) = &item.metadata().goal_id {
            metadata.insert("goalId".to_string(), MetadataValue::Single(goal_id.clone()));
        }
        if let Some(scope) = &scope {
            metadata.insert("scope".to_string(), MetadataValue::Single(scope.clone()));
        }

        let record = VectorRecord { id: item.id().to_string(), vector, metadata };
        self.vector_store.upsert(record).await?;

        let id = item.id().to_string();
        if let Err(save_err) = self.repository.save(item).await {
            // Vector-index-never-ahead-of-repository invariant: best-effort
            // rollback, then propagate the original failure unchanged.
            if let Err(rollback_err) = self.vector_store.delete(&id).await {
                warn!("Vector rollback failed for {}: {}", id, rollback_err);
            }
            return Err(save_err);
        }

        Ok(id)
    }

    pub async fn add_episodic(
        &self,
        id: String,
        content: String,
        event_type: String,
        metadata: MemoryItemMetadata,
    ) -> Result<String> {
        self.write(MemoryItem::Episodic {
            id,
            content,
            created_at: Utc::now().timestamp_millis(),
            last_accessed_at: None,
            metadata,
            event_type,
        })
        .await
    }

    pub async fn add_semantic(
        &self,
        id: String,
        content: String,
        fact_confidence: f32,
        metadata: MemoryItemMetadata,
    ) -> Result<String> {
        self.write(MemoryItem::Semantic {
            id,
            content,
            created_at: Utc::now().timestamp_millis(),
            last_accessed_at: None,
            metadata,
            fact_confidence: fact_confidence.clamp(0.0, 1.0),
        })
        .await
    }

    pub async fn add_procedural(
        &self,
        id: String,
        content: String,
        plan_summary: String,
        success_rate: f32,
        metadata: MemoryItemMetadata,
    ) -> Result<String> {
        self.write(MemoryItem::Procedural {
            id,
            content,
            created_at: Utc::now().timestamp_millis(),
            last_accessed_at: None,
            metadata,
            plan_summary,
            success_rate: success_rate.clamp(0.0, 1.0),
        })
        .await
    }

    fn build_filter(opts: &QueryOptions) -> Option<MetadataFilter> {
        let mut filters = Vec::new();
        if let Some(scope) = &opts.scope {
            filters.push(MetadataFilter::Eq("scope".to_string(), scope.clone()));
        }
        match opts.types.len() {
            0 => {}
            1 => filters.push(MetadataFilter::Eq("type".to_string(), opts.types[0].clone())),
            _ => filters.push(MetadataFilter::In("type".to_string(), opts.types.clone())),
        }
        match filters.len() {
            0 => None,
            1 => filters.into_iter().next(),
            _ => Some(MetadataFilter::And(filters)),
        }
    }

    pub async fn query(&self, text: &str, opts: QueryOptions) -> Result<Vec<SearchResult>> {
        if text.is_empty() {
            bail!("Invalid query: text must not be empty");
        }
        let limit = if opts.limit == 0 { default_query_limit() } else { opts.limit };

        let vector = self.embedder.embed(text).await?;
        let filter = Self::build_filter(&opts);
        let hits = self.vector_store.query(&vector, limit, filter.as_ref()).await?;

        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let items = self.repository.get_many(&ids).await?;
        let mut by_id: HashMap<String, MemoryItem> =
            items.into_iter().map(|item| (item.id().to_string(), item)).collect();

        let now = Utc::now().timestamp_millis();
        let mut results = Vec::new();
        for hit in hits {
            let Some(item) = by_id.remove(&hit.id) else { continue };
            let age_ms = (now - item.created_at()).max(0);
            let decay = scoring::time_decay(age_ms, self.weights.half_life_ms);
            let relevance = scoring::goal_relevance(item.content(), &opts.goals);
            let combined = scoring::combine(hit.similarity, decay, relevance, &self.weights);

            let accessed = item.with_accessed_at(now);
            self.repository.save(accessed.clone()).await.ok();

            results.push(SearchResult {
                memory: accessed,
                similarity: combined.similarity,
                time_decay: combined.time_decay,
                goal_relevance: combined.goal_relevance,
                score: combined.score,
            });
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        debug!("Query '{}' returned {} results", text, results.len());
        Ok(results)
    }

    pub async fn inject_for_prompt(&self, text: &str, opts: QueryOptions) -> Result<String> {
        let results = self.query(text, opts).await?;
        Ok(results
            .iter()
            .map(|r| format!("[{}] {}", r.memory.kind_str(), r.memory.content()))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
