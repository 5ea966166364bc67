use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;

use crate::core::types::{Entity, Relation};
use crate::graph::index::GraphIndex;
use crate::search::filter::{Page, SearchFilter};

/// Entity with its relevance score
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub entity: Entity,
    pub score: f32,
}

/// Result page plus the subgraph projection of the returned entities
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Relations whose endpoints are both in the returned hit set
    pub relations: Vec<Relation>,
    /// Matches after filtering, before pagination
    pub total: usize,
    pub took_ms: u64,
}

impl SearchResults {
    pub fn empty() -> Self {
        SearchResults {
            hits: Vec::new(),
            relations: Vec::new(),
            total: 0,
            took_ms: 0,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.entity.name.as_str()).collect()
    }
}

/// Filter (post-ranking), paginate (last), then project the subgraph
pub fn assemble(
    ranked_hits: Vec<SearchHit>,
    filter: &SearchFilter,
    page: Page,
    graph: &GraphIndex,
    started: Instant,
) -> SearchResults {
    let filtered: Vec<SearchHit> = ranked_hits
        .into_iter()
        .filter(|hit| filter.matches(&hit.entity))
        .collect();
    let total = filtered.len();
    let paged = page.slice(filtered);

    let names: HashSet<String> = paged.iter().map(|h| h.entity.name.clone()).collect();
    let relations = graph.relations_within(&names);

    SearchResults {
        hits: paged,
        relations,
        total,
        took_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EntityLimits;

    fn hit(entity: Entity, score: f32) -> SearchHit {
        SearchHit { entity, score }
    }

    fn graph_with_relation() -> GraphIndex {
        let mut graph = GraphIndex::new(EntityLimits::default());
        graph.create_entity(Entity::new("Alice", "person")).unwrap();
        graph.create_entity(Entity::new("Acme", "company")).unwrap();
        graph.create_entity(Entity::new("Bob", "person")).unwrap();
        graph
            .create_relation(Relation::new("Alice", "Acme", "works_at"))
            .unwrap();
        graph
            .create_relation(Relation::new("Bob", "Acme", "works_at"))
            .unwrap();
        graph
    }

    #[test]
    fn projection_requires_both_endpoints() {
        let graph = graph_with_relation();
        let hits = vec![
            hit(graph.get_by_name("Alice").unwrap().clone(), 1.0),
            hit(graph.get_by_name("Acme").unwrap().clone(), 0.5),
        ];
        let results = assemble(
            hits,
            &SearchFilter::default(),
            Page::new(0, 10),
            &graph,
            Instant::now(),
        );
        // Bob is absent, so only the Alice->Acme edge projects
        assert_eq!(results.relations.len(), 1);
        assert_eq!(results.relations[0].from, "Alice");
    }

    #[test]
    fn total_counts_before_pagination() {
        let graph = graph_with_relation();
        let hits: Vec<SearchHit> = graph
            .entities_in_order()
            .map(|e| hit(e.clone(), 1.0))
            .collect();
        let results = assemble(
            hits,
            &SearchFilter::default(),
            Page::new(0, 2),
            &graph,
            Instant::now(),
        );
        assert_eq!(results.total, 3);
        assert_eq!(results.hits.len(), 2);
    }

    #[test]
    fn filter_runs_before_pagination() {
        let graph = graph_with_relation();
        let hits: Vec<SearchHit> = graph
            .entities_in_order()
            .map(|e| hit(e.clone(), 1.0))
            .collect();
        let filter = SearchFilter {
            entity_type: Some("person".into()),
            ..Default::default()
        };
        let results = assemble(hits, &filter, Page::new(0, 1), &graph, Instant::now());
        assert_eq!(results.total, 2);
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].entity.name, "Alice");
    }
}
