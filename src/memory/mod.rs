//! Memory subsystem: tenant-scoped vector search with hybrid scoring,
//! oversampling under filters, and atomic write with vector-store rollback.

pub mod embedding;
pub mod entry;
pub mod manager;
pub mod repository;
pub mod scoped;
pub mod scoring;
pub mod vector;

pub use embedding::{EmbeddingProvider, FastEmbedProvider, HashEmbedder};
pub use entry::{MemoryItem, MemoryItemMetadata};
pub use manager::{MemoryManager, PoisoningGuard, QueryOptions, SearchResult};
pub use repository::{InMemoryMemoryRepository, MemoryRepository};
pub use scoped::ScopedMemoryManager;
pub use vector::{InMemoryVectorStore, MetadataFilter, VectorStore};
