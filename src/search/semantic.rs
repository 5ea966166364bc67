use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

use crate::core::cancel::CancellationToken;
use crate::core::error::Result;
use crate::graph::index::GraphIndex;
use crate::index::vector::VectorStore;
use crate::ports::Embedder;
use crate::search::filter::{Page, SearchFilter};
use crate::search::results::{SearchHit, SearchResults, assemble};

/// Embedding-backed retrieval through the `Embedder` port
///
/// Embedder absence is not an error: retrieval yields an empty result set
/// and hybrid fusion renormalizes over the remaining layers.
pub struct SemanticSearch<'a> {
    graph: &'a GraphIndex,
    vectors: &'a VectorStore,
    embedder: Option<&'a dyn Embedder>,
}

impl<'a> SemanticSearch<'a> {
    pub fn new(
        graph: &'a GraphIndex,
        vectors: &'a VectorStore,
        embedder: Option<&'a dyn Embedder>,
    ) -> Self {
        SemanticSearch {
            graph,
            vectors,
            embedder,
        }
    }

    pub fn search(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        let started = Instant::now();
        let Some(embedder) = self.embedder.filter(|e| e.is_available()) else {
            return Ok(SearchResults::empty());
        };

        let query_vector = embedder.embed(query)?;
        // score the full pool; filters and pagination come afterwards
        let scored = self.vectors.search(&query_vector, self.vectors.len())?;

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .filter_map(|(name, score)| {
                self.graph.get_by_name(&name).map(|entity| SearchHit {
                    entity: entity.clone(),
                    score,
                })
            })
            .collect();

        Ok(assemble(hits, filter, page, self.graph, started))
    }

    /// Raw cosine scores for hybrid fusion, capped at `limit`
    pub fn layer_scores(&self, query: &str, limit: usize) -> Result<HashMap<String, f32>> {
        let Some(embedder) = self.embedder.filter(|e| e.is_available()) else {
            return Ok(HashMap::new());
        };
        let query_vector = embedder.embed(query)?;
        let scored = self.vectors.search(&query_vector, limit)?;
        Ok(scored.into_iter().collect())
    }
}

/// Embed one entity's combined text into the vector store
pub fn index_entity(
    embedder: &dyn Embedder,
    vectors: &mut VectorStore,
    graph: &GraphIndex,
    name: &str,
) -> Result<bool> {
    let Some(entity) = graph.get_by_name(name) else {
        return Ok(false);
    };
    let vector = embedder.embed(&entity.combined_text())?;
    vectors.insert(name.to_string(), vector)?;
    Ok(true)
}

/// Re-indexing pipeline: embed every entity, with cancellation checkpoints
pub fn index_all(
    embedder: &dyn Embedder,
    vectors: &mut VectorStore,
    graph: &GraphIndex,
    token: &CancellationToken,
) -> Result<usize> {
    vectors.clear();
    let mut indexed = 0;
    for (i, entity) in graph.entities_in_order().enumerate() {
        if i % 16 == 0 {
            token.check()?;
        }
        let vector = embedder.embed(&entity.combined_text())?;
        vectors.insert(entity.name.clone(), vector)?;
        indexed += 1;
    }
    debug!(indexed, "semantic reindex complete");
    Ok(indexed)
}
