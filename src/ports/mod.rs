use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use crate::core::error::Result;
use crate::core::types::{Entity, EntityPatch, Relation};

/// Full graph content exchanged with the persistence backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// One acknowledged write, journaled through `GraphStore::append`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphMutation {
    CreateEntity { entity: Entity },
    UpdateEntity { name: String, patch: EntityPatch },
    DeleteEntity { name: String },
    AddObservations { name: String, observations: Vec<String> },
    RemoveObservation { name: String, observation: String },
    AddTags { name: String, tags: Vec<String> },
    RemoveTag { name: String, tag: String },
    SetImportance { name: String, importance: Option<f32> },
    SetParent { name: String, parent: Option<String> },
    CreateRelation { relation: Relation },
    DeleteRelation { relation: Relation },
}

/// Persistence port; the core assumes at-most-once delivery of each
/// acknowledged mutation and delegates all durability concerns
pub trait GraphStore: Send + Sync {
    fn load_snapshot(&self) -> Result<GraphSnapshot>;
    fn append(&self, mutation: &GraphMutation) -> Result<()>;
    fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<()>;
    fn entity_by_name(&self, name: &str) -> Result<Option<Entity>>;
}

/// Embedding provider port producing fixed-dimension vectors
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn is_available(&self) -> bool;
    fn dimension(&self) -> usize;
}

/// Compute fan-out port used by fuzzy search
///
/// `map_ranges` splits `0..total` into chunks, evaluates `f` over each chunk
/// (possibly in parallel) and concatenates chunk outputs in range order, so
/// the merge is deterministic and preserves candidate order.
pub trait WorkerPool: Send + Sync {
    fn map_ranges(
        &self,
        total: usize,
        chunk_size: usize,
        f: &(dyn Fn(Range<usize>) -> Vec<(usize, f32)> + Send + Sync),
    ) -> Vec<(usize, f32)>;
}

/// Rayon-backed worker pool
pub struct RayonWorkerPool;

impl WorkerPool for RayonWorkerPool {
    fn map_ranges(
        &self,
        total: usize,
        chunk_size: usize,
        f: &(dyn Fn(Range<usize>) -> Vec<(usize, f32)> + Send + Sync),
    ) -> Vec<(usize, f32)> {
        use rayon::prelude::*;

        if total == 0 {
            return Vec::new();
        }
        let chunk_size = chunk_size.max(1);
        let ranges: Vec<Range<usize>> = (0..total)
            .step_by(chunk_size)
            .map(|start| start..(start + chunk_size).min(total))
            .collect();

        // par_iter keeps chunk order in collect, so the merge is stable
        ranges
            .into_par_iter()
            .map(f)
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Single-threaded fallback with the same merge contract
pub struct SerialWorkerPool;

impl WorkerPool for SerialWorkerPool {
    fn map_ranges(
        &self,
        total: usize,
        chunk_size: usize,
        f: &(dyn Fn(Range<usize>) -> Vec<(usize, f32)> + Send + Sync),
    ) -> Vec<(usize, f32)> {
        let chunk_size = chunk_size.max(1);
        let mut out = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + chunk_size).min(total);
            out.extend(f(start..end));
            start = end;
        }
        out
    }
}

/// In-memory reference store: snapshot plus mutation journal
#[derive(Default)]
pub struct MemoryGraphStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    snapshot: GraphSnapshot,
    journal: Vec<GraphMutation>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: GraphSnapshot) -> Self {
        MemoryGraphStore {
            inner: Mutex::new(MemoryStoreInner {
                snapshot,
                journal: Vec::new(),
            }),
        }
    }

    pub fn journal_len(&self) -> usize {
        self.inner.lock().journal.len()
    }

    pub fn journal(&self) -> Vec<GraphMutation> {
        self.inner.lock().journal.clone()
    }
}

impl GraphStore for MemoryGraphStore {
    fn load_snapshot(&self) -> Result<GraphSnapshot> {
        Ok(self.inner.lock().snapshot.clone())
    }

    fn append(&self, mutation: &GraphMutation) -> Result<()> {
        self.inner.lock().journal.push(mutation.clone());
        Ok(())
    }

    fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<()> {
        self.inner.lock().snapshot = snapshot.clone();
        Ok(())
    }

    fn entity_by_name(&self, name: &str) -> Result<Option<Entity>> {
        Ok(self
            .inner
            .lock()
            .snapshot
            .entities
            .iter()
            .find(|e| e.name == name)
            .cloned())
    }
}

/// Deterministic feature-hashing embedder
///
/// Buckets lower-cased words into a fixed-dimension vector and normalizes.
/// Texts sharing words land near each other, which is enough for semantic
/// retrieval in tests and offline setups without a model server.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        HashingEmbedder {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        HashingEmbedder::new(128)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Collect the distinct entity names a mutation touches; test helper for
/// replay assertions
pub fn touched_names(mutation: &GraphMutation) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    match mutation {
        GraphMutation::CreateEntity { entity } => {
            names.insert(entity.name.clone());
        }
        GraphMutation::UpdateEntity { name, .. }
        | GraphMutation::DeleteEntity { name }
        | GraphMutation::AddObservations { name, .. }
        | GraphMutation::RemoveObservation { name, .. }
        | GraphMutation::AddTags { name, .. }
        | GraphMutation::RemoveTag { name, .. }
        | GraphMutation::SetImportance { name, .. }
        | GraphMutation::SetParent { name, .. } => {
            names.insert(name.clone());
        }
        GraphMutation::CreateRelation { relation }
        | GraphMutation::DeleteRelation { relation } => {
            names.insert(relation.from.clone());
            names.insert(relation.to.clone());
        }
    }
    names
}
