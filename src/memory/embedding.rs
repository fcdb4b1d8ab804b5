//! Embedding provider: text -> normalized vector.
//!
//! `FastEmbedProvider` generalizes this codebase's `VectorMemory::embed`
//! (fastembed `TextEmbedding`, normalized for dot-product similarity) into
//! a standalone pluggable collaborator the memory manager consults on write
//! and query.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

fn normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedProvider {
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .context("Failed to initialize embedding model")?;
        Ok(Self { model: Mutex::new(model) })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.lock().await;
        let mut embeddings = model
            .embed(vec![text.to_string()], None)
            .context("Failed to generate embedding")?;
        let mut vector = embeddings.pop().context("No embedding generated")?;
        normalize(&mut vector);
        Ok(vector)
    }
}

/// Deterministic, dependency-free embedder for tests: hashes token
/// n-grams into a fixed-size bag-of-words vector, then normalizes. Not a
/// semantic embedding, but cosine similarity over it behaves sensibly for
/// the round-trip/tenant-isolation/scope-dilution test scenarios, which
/// only require that near-identical text scores higher than unrelated text.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dims];
        for token in crate::memory::scoring::tokenize(text) {
            let mut hash: u64 = 1469598103934665603;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let idx = (hash as usize) % self.dims;
            vector[idx] += 1.0;
        }
        normalize(&mut vector);
        Ok(vector)
    }
}
