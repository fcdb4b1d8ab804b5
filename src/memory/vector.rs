//! Vector store: similarity search with metadata filter push-down.
//!
//! Generalizes this codebase's `VectorMemory` (fastembed + a file-backed
//! `Arc<RwLock<Vec<MemoryEntry>>>` cache, normalized-dot-product similarity)
//! into a pluggable trait. The shipped implementation keeps the same
//! in-memory cache shape; a production deployment would swap in a real
//! vector database behind the same trait.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A value attached to a vector record's metadata map. Mirrors the data
/// model's `string -> string | string[]`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Single(String),
    Many(Vec<String>),
}

impl MetadataValue {
    fn contains(&self, needle: &str) -> bool {
        match self {
            MetadataValue::Single(s) => s == needle,
            MetadataValue::Many(v) => v.iter().any(|s| s == needle),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, MetadataValue>,
}

impl VectorRecord {
    /// Validates the invariant that every vector component is finite.
    /// Dimension-consistency across the store is enforced by the store
    /// itself on `upsert`, since only it knows the dimension of prior writes.
    pub fn validate(&self) -> Result<()> {
        if self.vector.iter().any(|v| !v.is_finite()) {
            bail!("Invalid vector: contains non-finite component");
        }
        Ok(())
    }
}

/// A metadata filter pushed down into the store. Built from `{scope?,
/// type?}`: a single requested type becomes `Eq`, multiple types become
/// `In`; a present scope is combined with `And`.
#[derive(Debug, Clone)]
pub enum MetadataFilter {
    Eq(String, String),
    In(String, Vec<String>),
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    fn matches(&self, metadata: &HashMap<String, MetadataValue>) -> bool {
        match self {
            MetadataFilter::Eq(key, value) => {
                metadata.get(key).map(|v| v.contains(value)).unwrap_or(false)
            }
            MetadataFilter::In(key, values) => metadata
                .get(key)
                .map(|v| values.iter().any(|needle| v.contains(needle)))
                .unwrap_or(false),
            MetadataFilter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// A scored hit returned from a similarity query: the stored id and its
/// similarity to the query vector (cosine similarity via normalized
/// dot-product, as this codebase's embedder already normalizes).
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, record: VectorRecord) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>>;
}

/// In-process vector store backed by an in-memory vector of records,
/// the same cache-and-scan shape the codebase's `VectorMemory` uses before
/// it persists to disk.
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
    dimension: RwLock<Option<usize>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            dimension: RwLock::new(None),
        }
    }

    fn dot_product(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        record.validate()?;

        {
            let mut dim = self.dimension.write().await;
            match *dim {
                Some(d) if d != record.vector.len() => {
                    bail!(
                        "Invalid vector: dimension {} does not match store dimension {}",
                        record.vector.len(),
                        d
                    );
                }
                Some(_) => {}
                None => *dim = Some(record.vector.len()),
            }
        }

        let mut records = self.records.write().await;
        records.retain(|r| r.id != record.id);
        records.push(record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.retain(|r| r.id != id);
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        let records = self.records.read().await;
        let mut scored: Vec<VectorHit> = records
            .iter()
            .filter(|r| filter.map(|f| f.matches(&r.metadata)).unwrap_or(true))
            .map(|r| VectorHit {
                id: r.id.clone(),
                similarity: Self::dot_product(vector, &r.vector),
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, vector: Vec<f32>, kind: &str) -> VectorRecord {
        let mut metadata = HashMap::new();
        metadata.insert("type".to_string(), MetadataValue::Single(kind.to_string()));
        VectorRecord { id: id.to_string(), vector, metadata }
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], "episodic")).await.unwrap();
        store.upsert(record("b", vec![0.0, 1.0], "episodic")).await.unwrap();

        let hits = store.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_filter_push_down_single_type() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], "episodic")).await.unwrap();
        store.upsert(record("b", vec![1.0, 0.0], "semantic")).await.unwrap();

        let filter = MetadataFilter::Eq("type".into(), "semantic".into());
        let hits = store.query(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn test_filter_push_down_multi_type() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], "episodic")).await.unwrap();
        store.upsert(record("b", vec![1.0, 0.0], "semantic")).await.unwrap();
        store.upsert(record("c", vec![1.0, 0.0], "procedural")).await.unwrap();

        let filter = MetadataFilter::In("type".into(), vec!["episodic".into(), "semantic".into()]);
        let hits = store.query(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], "episodic")).await.unwrap();
        let err = store.upsert(record("b", vec![1.0, 0.0, 0.0], "episodic")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], "episodic")).await.unwrap();
        store.upsert(record("a", vec![1.0, 0.0], "episodic")).await.unwrap();
        let hits = store.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_leaves_no_dangling_vector() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], "episodic")).await.unwrap();
        store.delete("a").await.unwrap();
        let hits = store.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }
}
