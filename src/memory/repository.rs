//! Memory repository: the durable store of memory items.
//!
//! Stands in for the relational driver named out of scope in this
//! codebase's persistence layer — `VectorMemory::persist` writes a JSON
//! file as its backing store; this trait generalizes that same
//! upsert-on-write approach to the three memory-item kinds.

use super::entry::MemoryItem;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Upsert on `id`.
    async fn save(&self, item: MemoryItem) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<MemoryItem>>;
    async fn get_many(&self, ids: &[String]) -> Result<Vec<MemoryItem>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct InMemoryMemoryRepository {
    rows: RwLock<HashMap<String, MemoryItem>>,
}

impl InMemoryMemoryRepository {
    pub fn new() -> Self {
        Self { rows: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemoryRepository {
    async fn save(&self, item: MemoryItem) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert(item.id().to_string(), item);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryItem>> {
        let rows = self.rows.read().await;
        Ok(rows.get(id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<MemoryItem>> {
        let rows = self.rows.read().await;
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.remove(id);
        Ok(())
    }
}

/// A repository that always fails `save`, used to exercise the vector
/// rollback path in tests without a mocking framework.
#[cfg(test)]
pub struct FailingRepository;

#[cfg(test)]
#[async_trait]
impl MemoryRepository for FailingRepository {
    async fn save(&self, _item: MemoryItem) -> Result<()> {
        anyhow::bail!("db down")
    }
    async fn get(&self, _id: &str) -> Result<Option<MemoryItem>> {
        Ok(None)
    }
    async fn get_many(&self, _ids: &[String]) -> Result<Vec<MemoryItem>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::entry::MemoryItemMetadata;

    fn episodic(id: &str) -> MemoryItem {
        MemoryItem::Episodic {
            id: id.to_string(),
            content: "event happened".into(),
            created_at: 0,
            last_accessed_at: None,
            metadata: MemoryItemMetadata::default(),
            event_type: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_save_upserts() {
        let repo = InMemoryMemoryRepository::new();
        repo.save(episodic("m1")).await.unwrap();
        repo.save(episodic("m1")).await.unwrap();
        assert!(repo.get("m1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_removes() {
        let repo = InMemoryMemoryRepository::new();
        repo.save(episodic("m1")).await.unwrap();
        repo.delete("m1").await.unwrap();
        assert!(repo.get("m1").await.unwrap().is_none());
    }
}
