use std::time::Instant;

use crate::core::error::Result;
use crate::graph::index::GraphIndex;
use crate::query::matcher::{AstCache, BooleanMatcher};
use crate::query::parser::QueryParser;
use crate::search::filter::{Page, SearchFilter};
use crate::search::results::{SearchHit, SearchResults, assemble};

/// Boolean retrieval: parse (through the AST cache), evaluate per entity
///
/// Parse and validation errors surface to the caller unchanged. Matches
/// keep insertion order and score 1.0.
pub struct BooleanSearch<'a> {
    graph: &'a GraphIndex,
    parser: &'a QueryParser,
    ast_cache: &'a AstCache,
}

impl<'a> BooleanSearch<'a> {
    pub fn new(graph: &'a GraphIndex, parser: &'a QueryParser, ast_cache: &'a AstCache) -> Self {
        BooleanSearch {
            graph,
            parser,
            ast_cache,
        }
    }

    pub fn search(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        let started = Instant::now();

        let node = match self.ast_cache.get(query) {
            Some(node) => node,
            None => {
                let node = self.parser.parse(query)?;
                self.ast_cache.put(query.to_string(), node.clone());
                node
            }
        };

        let matcher = BooleanMatcher::new(self.graph);
        let hits: Vec<SearchHit> = self
            .graph
            .names_in_order()
            .iter()
            .filter(|name| matcher.matches(&node, name))
            .filter_map(|name| self.graph.get_by_name(name))
            .map(|entity| SearchHit {
                entity: entity.clone(),
                score: 1.0,
            })
            .collect();

        Ok(assemble(hits, filter, page, self.graph, started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EntityLimits;
    use crate::core::error::Error;
    use crate::core::types::Entity;

    fn graph() -> GraphIndex {
        let mut graph = GraphIndex::new(EntityLimits::default());
        graph
            .create_entity(Entity::new("Alice", "person").with_tags(["python"]))
            .unwrap();
        graph
            .create_entity(Entity::new("Bob", "person").with_tags(["design"]))
            .unwrap();
        graph.create_entity(Entity::new("Acme", "company")).unwrap();
        graph
    }

    #[test]
    fn mixed_operator_query_matches_expected_set() {
        let graph = graph();
        let parser = QueryParser::default();
        let cache = AstCache::new(16);
        let search = BooleanSearch::new(&graph, &parser, &cache);

        let results = search
            .search(
                "type:person AND (tag:python OR tag:design)",
                &SearchFilter::default(),
                Page::new(0, 10),
            )
            .unwrap();
        assert_eq!(results.names(), vec!["Alice", "Bob"]);

        let excluded = search
            .search(
                "type:person NOT tag:python",
                &SearchFilter::default(),
                Page::new(0, 10),
            )
            .unwrap();
        assert_eq!(excluded.names(), vec!["Bob"]);
    }

    #[test]
    fn parse_error_surfaces() {
        let graph = graph();
        let parser = QueryParser::default();
        let cache = AstCache::new(16);
        let search = BooleanSearch::new(&graph, &parser, &cache);
        assert!(matches!(
            search.search("(oops", &SearchFilter::default(), Page::new(0, 10)),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn repeated_query_reuses_cached_ast() {
        let graph = graph();
        let parser = QueryParser::default();
        let cache = AstCache::new(16);
        let search = BooleanSearch::new(&graph, &parser, &cache);

        search
            .search("tag:python", &SearchFilter::default(), Page::new(0, 10))
            .unwrap();
        assert_eq!(cache.len(), 1);
        search
            .search("tag:python", &SearchFilter::default(), Page::new(0, 10))
            .unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn filters_apply_after_matching() {
        let graph = graph();
        let parser = QueryParser::default();
        let cache = AstCache::new(16);
        let search = BooleanSearch::new(&graph, &parser, &cache);

        let filter = SearchFilter {
            tags: vec!["design".into()],
            ..Default::default()
        };
        let results = search
            .search("type:person", &filter, Page::new(0, 10))
            .unwrap();
        assert_eq!(results.names(), vec!["Bob"]);
    }
}
