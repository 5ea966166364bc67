use std::collections::HashMap;

use crate::core::error::{Error, Result};

/// Entity-to-unit-vector store with cosine nearest-neighbour search
///
/// Vectors are normalized on insert, so cosine similarity reduces to a dot
/// product. A vector exists only for currently indexed entities and always
/// has the store dimension.
pub struct VectorStore {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        VectorStore {
            vectors: HashMap::new(),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vectors.contains_key(name)
    }

    /// Insert a vector, normalizing to unit length
    pub fn insert(&mut self, name: String, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::Validation(format!(
                "vector dimension {} does not match store dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(Error::Validation(
                "vector must be finite and non-zero".into(),
            ));
        }
        let unit: Vec<f32> = vector.into_iter().map(|v| v / norm).collect();
        self.vectors.insert(name, unit);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.vectors.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }

    /// Top-k entities by cosine similarity, ties broken by name ascending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::Validation(format!(
                "query dimension {} does not match store dimension {}",
                query.len(),
                self.dimension
            )));
        }
        let norm = query.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(name, vector)| {
                let dot: f32 = vector.iter().zip(query).map(|(a, b)| a * b).sum();
                (name.clone(), dot / norm)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}
