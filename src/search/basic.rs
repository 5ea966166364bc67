use std::time::Instant;

use crate::graph::index::GraphIndex;
use crate::search::filter::{Page, SearchFilter};
use crate::search::results::{SearchHit, SearchResults, assemble};

/// Case-insensitive substring search over name, type, observations and tags
///
/// Hits keep insertion order; every hit scores 1.0.
pub struct BasicSearch<'a> {
    graph: &'a GraphIndex,
}

impl<'a> BasicSearch<'a> {
    pub fn new(graph: &'a GraphIndex) -> Self {
        BasicSearch { graph }
    }

    pub fn search(&self, query: &str, filter: &SearchFilter, page: Page) -> SearchResults {
        let started = Instant::now();
        let needle = query.to_lowercase();

        let hits: Vec<SearchHit> = self
            .graph
            .names_in_order()
            .iter()
            .filter(|name| {
                self.graph
                    .get_lowercased(name)
                    .is_some_and(|lower| {
                        lower.name.contains(&needle)
                            || lower.entity_type.contains(&needle)
                            || lower.observations.iter().any(|o| o.contains(&needle))
                            || lower.tags.iter().any(|t| t.contains(&needle))
                    })
            })
            .filter_map(|name| self.graph.get_by_name(name))
            .map(|entity| SearchHit {
                entity: entity.clone(),
                score: 1.0,
            })
            .collect();

        assemble(hits, filter, page, self.graph, started)
    }
}
