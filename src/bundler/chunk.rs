//! Chunk generation for code splitting

use serde::{Deserialize, Serialize};

use super::ModuleId;

/// Classification of a chunk or load point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Loaded at application startup
    Initial,
    /// Loaded on demand via dynamic import
    Async,
}

/// A chunk is a group of modules that will be delivered together
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name (used for output filename)
    pub name: String,

    /// Initial if any initial load point pulls it in
    pub kind: ChunkKind,

    /// Module IDs included in this chunk, dependencies first
    pub module_ids: Vec<ModuleId>,

    /// Cumulative size of all member modules
    pub size: u64,

    /// Cache group that split this chunk out, if any
    pub cache_group: Option<String>,

    /// Whether a cache group reused this existing chunk instead of emitting a new one
    pub reused: bool,

    /// Indices of the load points that request this chunk
    pub load_points: Vec<usize>,
}

impl Chunk {
    /// Create the main chunk of a load point
    pub fn main(name: String, kind: ChunkKind) -> Self {
        Self {
            name,
            kind,
            module_ids: Vec::new(),
            size: 0,
            cache_group: None,
            reused: false,
            load_points: Vec::new(),
        }
    }

    /// Create a chunk split out by a cache group
    pub fn split(name: String, cache_group: String) -> Self {
        Self {
            cache_group: Some(cache_group),
            ..Self::main(name, ChunkKind::Async)
        }
    }

    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }

    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.module_ids.len()
    }

    /// Check if chunk contains a module
    pub fn contains(&self, id: ModuleId) -> bool {
        self.module_ids.contains(&id)
    }
}

/// A point where the runtime starts loading: an entry or a dynamic import target
#[derive(Debug, Clone)]
pub struct LoadPoint {
    /// Entry name, or the dynamically imported module's identifier
    pub name: String,

    /// Initial for entries, async for dynamic imports
    pub kind: ChunkKind,

    /// Module the load starts from
    pub root: ModuleId,

    /// Chunks requested for this load, shared chunks first and the main chunk last
    pub chunks: Vec<usize>,
}

impl LoadPoint {
    /// Number of request slots this load consumes
    pub fn requests(&self) -> usize {
        self.chunks.len()
    }
}
