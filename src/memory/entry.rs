//! Memory item types.
//!
//! A tagged variant generalized from this codebase's plain `MemoryEntry`
//! (see the vector-store module) into the three kinds the cognitive cycle
//! distinguishes: episodic, semantic, procedural.

use serde::{Deserialize, Serialize};

/// Common metadata carried by every memory item, independent of its kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryItemMetadata {
    pub source: Option<String>,
    pub goal_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A memory item: the content plus common bookkeeping fields, tagged with
/// the kind-specific fields that distinguish episodic/semantic/procedural
/// entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum MemoryItem {
    Episodic {
        id: String,
        content: String,
        created_at: i64,
        last_accessed_at: Option<i64>,
        metadata: MemoryItemMetadata,
        event_type: String,
    },
    Semantic {
        id: String,
        content: String,
        created_at: i64,
        last_accessed_at: Option<i64>,
        metadata: MemoryItemMetadata,
        fact_confidence: f32,
    },
    Procedural {
        id: String,
        content: String,
        created_at: i64,
        last_accessed_at: Option<i64>,
        metadata: MemoryItemMetadata,
        plan_summary: String,
        success_rate: f32,
    },
}

impl MemoryItem {
    pub fn id(&self) -> &str {
        match self {
            MemoryItem::Episodic { id, .. } => id,
            MemoryItem::Semantic { id, .. } => id,
            MemoryItem::Procedural { id, .. } => id,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            MemoryItem::Episodic { content, .. } => content,
            MemoryItem::Semantic { content, .. } => content,
            MemoryItem::Procedural { content, .. } => content,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            MemoryItem::Episodic { created_at, .. } => *created_at,
            MemoryItem::Semantic { created_at, .. } => *created_at,
            MemoryItem::Procedural { created_at, .. } => *created_at,
        }
    }

    pub fn last_accessed_at(&self) -> Option<i64> {
        match self {
            MemoryItem::Episodic { last_accessed_at, .. } => *last_accessed_at,
            MemoryItem::Semantic { last_accessed_at, .. } => *last_accessed_at,
            MemoryItem::Procedural { last_accessed_at, .. } => *last_accessed_at,
        }
    }

    pub fn metadata(&self) -> &MemoryItemMetadata {
        match self {
            MemoryItem::Episodic { metadata, .. } => metadata,
            MemoryItem::Semantic { metadata, .. } => metadata,
            MemoryItem::Procedural { metadata, .. } => metadata,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            MemoryItem::Episodic { .. } => "episodic",
            MemoryItem::Semantic { .. } => "semantic",
            MemoryItem::Procedural { .. } => "procedural",
        }
    }

    /// Replace the physical id, preserving every other field. Used by the
    /// scoped memory manager to rewrite `id -> "<scope>:<id>"` before
    /// delegating, and to strip the prefix back off on the way out.
    pub fn with_id(mut self, new_id: String) -> Self {
        match &mut self {
            MemoryItem::Episodic { id, .. } => *id = new_id,
            MemoryItem::Semantic { id, .. } => *id = new_id,
            MemoryItem::Procedural { id, .. } => *id = new_id,
        }
        self
    }

    /// Stamp `lastAccessedAt`. The only mutation an item may receive after
    /// creation besides a full `delete`.
    pub fn with_accessed_at(mut self, now_ms: i64) -> Self {
        match &mut self {
            MemoryItem::Episodic { last_accessed_at, .. } => *last_accessed_at = Some(now_ms),
            MemoryItem::Semantic { last_accessed_at, .. } => *last_accessed_at = Some(now_ms),
            MemoryItem::Procedural { last_accessed_at, .. } => *last_accessed_at = Some(now_ms),
        }
        self
    }
}
