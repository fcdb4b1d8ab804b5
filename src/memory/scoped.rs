//! Scoped memory manager: tenant/request isolation wrapper.
//!
//! No direct precedent in this codebase (it is single-tenant); built fresh
//! in the delegation-plus-id-rewriting shape common to workspace-scoped
//! session wrappers, generalized to the memory manager's write/query
//! surface.

use super::entry::{MemoryItem, MemoryItemMetadata};
use super::manager::{MemoryManager, QueryOptions, SearchResult};
use anyhow::{bail, Result};
use std::sync::Arc;

pub struct ScopedMemoryManager {
    scope: String,
    inner: Arc<MemoryManager>,
    /// Anonymous/request-scoped callers get a non-persisting view: writes
    /// and reads become no-ops, per §4.3.
    persisting: bool,
}

impl ScopedMemoryManager {
    pub fn new(scope: impl Into<String>, inner: Arc<MemoryManager>, persisting: bool) -> Result<Self> {
        let scope = scope.into();
        if scope.is_empty() {
            bail!("Invalid scope: must not be empty");
        }
        if scope.contains(':') {
            bail!("Invalid scope: must not contain ':'");
        }
        Ok(Self { scope, inner, persisting })
    }

    fn scoped_id(&self, id: &str) -> String {
        format!("{}:{}", self.scope, id)
    }

    pub async fn add_episodic(
        &self,
        id: String,
        content: String,
        event_type: String,
        metadata: MemoryItemMetadata,
    ) -> Result<Option<String>> {
        if !self.persisting {
            return Ok(None);
        }
        self.inner
            .add_episodic(self.scoped_id(&id), content, event_type, metadata)
            .await
            .map(Some)
    }

    pub async fn add_semantic(
        &self,
        id: String,
        content: String,
        fact_confidence: f32,
        metadata: MemoryItemMetadata,
    ) -> Result<Option<String>> {
        if !self.persisting {
            return Ok(None);
        }
        self.inner
            .add_semantic(self.scoped_id(&id), content, fact_confidence, metadata)
            .await
            .map(Some)
    }

    pub async fn add_procedural(
        &self,
        id: String,
        content: String,
        plan_summary: String,
        success_rate: f32,
        metadata: MemoryItemMetadata,
    ) -> Result<Option<String>> {
        if !self.persisting {
            return Ok(None);
        }
        self.inner
            .add_procedural(self.scoped_id(&id), content, plan_summary, success_rate, metadata)
            .await
            .map(Some)
    }

    /// Expanded query defeating scope dilution: request `max(100,
    /// limit*10)` from the base manager, keep only results whose physical
    /// id is this scope's, strip the prefix, and truncate to the original
    /// limit. Per the recorded Open Question decision, results are not
    /// re-ranked after truncation — the base manager's score order is
    /// preserved.
    pub async fn query(&self, text: &str, mut opts: QueryOptions) -> Result<Vec<SearchResult>> {
        if !self.persisting {
            return Ok(Vec::new());
        }

        let original_limit = if opts.limit == 0 { super::manager::default_query_limit() } else { opts.limit };
        opts.limit = (original_limit * 10).max(100);
        opts.scope = Some(self.scope.clone());

        let results = self.inner.query(text, opts).await?;

        let prefix = format!("{}:", self.scope);
        let mut scoped_results: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| r.memory.id().starts_with(&prefix))
            .map(|mut r| {
                let stripped = r.memory.id()[prefix.len()..].to_string();
                r.memory = r.memory.with_id(stripped);
                r
            })
            .collect();

        scoped_results.truncate(original_limit);
        Ok(scoped_results)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embedding::HashEmbedder;
    use crate::memory::repository::InMemoryMemoryRepository;
    use crate::memory::vector::InMemoryVectorStore;

    fn base() -> Arc<MemoryManager> {
        Arc::new(MemoryManager::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(InMemoryMemoryRepository::new()),
        ))
    }

    #[test]
    fn test_rejects_empty_scope() {
        assert!(ScopedMemoryManager::new("", base(), true).is_err());
    }

    #[test]
    fn test_rejects_scope_with_colon() {
        assert!(ScopedMemoryManager::new("tenant:a", base(), true).is_err());
    }

    #[tokio::test]
    async fn test_returned_ids_never_contain_colon() {
        let inner = base();
        let scoped = ScopedMemoryManager::new("tenant-a", inner, true).unwrap();
        scoped
            .add_episodic("m1".into(), "confidential data".into(), "note".into(), MemoryItemMetadata::default())
            .await
            .unwrap();

        let results = scoped.query("confidential data", QueryOptions::with_limit(5)).await.unwrap();
        assert!(!results.is_empty());
        for r in &results {
            assert!(!r.memory.id().contains(':'));
        }
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let inner = base();
        let tenant_a = ScopedMemoryManager::new("tenant-a", inner.clone(), true).unwrap();
        let tenant_b = ScopedMemoryManager::new("tenant-b", inner, true).unwrap();

        tenant_a
            .add_episodic("m1".into(), "confidential".into(), "note".into(), MemoryItemMetadata::default())
            .await
            .unwrap();

        let results = tenant_b.query("confidential", QueryOptions::with_limit(10)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_scope_dilution_defeated() {
        let inner = base();
        let tenant_b = ScopedMemoryManager::new("tenant-b", inner.clone(), true).unwrap();
        for i in 0..50 {
            tenant_b
                .add_episodic(format!("m{i}"), "similar content about rockets".into(), "note".into(), MemoryItemMetadata::default())
                .await
                .unwrap();
        }

        let tenant_a = ScopedMemoryManager::new("tenant-a", inner, true).unwrap();
        tenant_a
            .add_episodic("only".into(), "similar content about rockets".into(), "note".into(), MemoryItemMetadata::default())
            .await
            .unwrap();

        let results = tenant_a.query("similar content about rockets", QueryOptions::with_limit(1)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory.id(), "only");
    }

    #[tokio::test]
    async fn test_non_persisting_mode_is_noop() {
        let inner = base();
        let anon = ScopedMemoryManager::new("req-123", inner, false).unwrap();
        let id = anon
            .add_episodic("m1".into(), "ephemeral".into(), "note".into(), MemoryItemMetadata::default())
            .await
            .unwrap();
        assert!(id.is_none());

        let results = anon.query("ephemeral", QueryOptions::with_limit(5)).await.unwrap();
        assert!(results.is_empty());
    }
}
