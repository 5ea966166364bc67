use std::time::Instant;

use crate::graph::index::GraphIndex;
use crate::index::inverted::InvertedIndex;
use crate::scoring::scorer::Scorer;
use crate::search::filter::{Page, SearchFilter};
use crate::search::results::{SearchHit, SearchResults, assemble};

/// Relevance-ranked retrieval over the inverted index
///
/// Parameterized by the scorer (TF-IDF for ranked search, Okapi for BM25
/// search); hits sort score descending with ties broken by name ascending.
pub struct RankedSearch<'a> {
    graph: &'a GraphIndex,
    index: &'a InvertedIndex,
    scorer: &'a dyn Scorer,
}

impl<'a> RankedSearch<'a> {
    pub fn new(graph: &'a GraphIndex, index: &'a InvertedIndex, scorer: &'a dyn Scorer) -> Self {
        RankedSearch {
            graph,
            index,
            scorer,
        }
    }

    pub fn search(&self, query: &str, filter: &SearchFilter, page: Page) -> SearchResults {
        let started = Instant::now();
        let scores = self.index.score_all(query, self.scorer);

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            // entity deleted between scoring and lookup simply drops out
            .filter_map(|(name, score)| {
                self.graph.get_by_name(&name).map(|entity| SearchHit {
                    entity: entity.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.name.cmp(&b.entity.name))
        });

        assemble(hits, filter, page, self.graph, started)
    }
}
