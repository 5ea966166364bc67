use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::core::types::LowercasedEntity;
use crate::graph::index::GraphIndex;
use crate::query::ast::{BooleanNode, QueryField};

/// Pure boolean evaluation over an entity's lower-case projection
///
/// `observation:` with a single simple word first tries the O(1)
/// observation-word index; that index is a positive-match shortcut only, a
/// miss falls back to substring matching because the two sides do not share
/// splitting rules for arbitrary values.
pub struct BooleanMatcher<'a> {
    graph: &'a GraphIndex,
}

impl<'a> BooleanMatcher<'a> {
    pub fn new(graph: &'a GraphIndex) -> Self {
        BooleanMatcher { graph }
    }

    pub fn matches(&self, node: &BooleanNode, entity_name: &str) -> bool {
        let Some(lower) = self.graph.get_lowercased(entity_name) else {
            return false;
        };
        self.matches_node(node, entity_name, &lower)
    }

    fn matches_node(&self, node: &BooleanNode, name: &str, lower: &LowercasedEntity) -> bool {
        match node {
            BooleanNode::And(children) => {
                children.iter().all(|c| self.matches_node(c, name, lower))
            }
            BooleanNode::Or(children) => {
                children.iter().any(|c| self.matches_node(c, name, lower))
            }
            BooleanNode::Not(child) => !self.matches_node(child, name, lower),
            BooleanNode::Term { field, value, phrase } => {
                self.matches_term(*field, value, *phrase, name, lower)
            }
        }
    }

    fn matches_term(
        &self,
        field: Option<QueryField>,
        value: &str,
        phrase: bool,
        name: &str,
        lower: &LowercasedEntity,
    ) -> bool {
        match field {
            None => {
                lower.name.contains(value)
                    || lower.entity_type.contains(value)
                    || lower.observations.iter().any(|o| o.contains(value))
                    || lower.tags.iter().any(|t| t.contains(value))
            }
            Some(QueryField::Name) => lower.name.contains(value),
            Some(QueryField::EntityType) => lower.entity_type == value,
            Some(QueryField::Tag) => lower.tags.iter().any(|t| t.as_str() == value),
            Some(QueryField::Observation) => {
                if !phrase && !value.contains(char::is_whitespace) {
                    if let Some(names) = self.graph.entities_by_observation_word(value) {
                        if names.contains(name) {
                            return true;
                        }
                    }
                }
                lower.observations.iter().any(|o| o.contains(value))
            }
        }
    }
}

/// Evaluate without graph-backed shortcuts; used for canonical comparison
pub fn evaluate_pure(node: &BooleanNode, lower: &LowercasedEntity) -> bool {
    match node {
        BooleanNode::And(children) => children.iter().all(|c| evaluate_pure(c, lower)),
        BooleanNode::Or(children) => children.iter().any(|c| evaluate_pure(c, lower)),
        BooleanNode::Not(child) => !evaluate_pure(child, lower),
        BooleanNode::Term { field, value, .. } => match field {
            None => {
                lower.name.contains(value.as_str())
                    || lower.entity_type.contains(value.as_str())
                    || lower.observations.iter().any(|o| o.contains(value))
                    || lower.tags.iter().any(|t| t.contains(value))
            }
            Some(QueryField::Name) => lower.name.contains(value.as_str()),
            Some(QueryField::EntityType) => &lower.entity_type == value,
            Some(QueryField::Tag) => lower.tags.iter().any(|t| t == value),
            Some(QueryField::Observation) => {
                lower.observations.iter().any(|o| o.contains(value))
            }
        },
    }
}

/// Bounded parse cache keyed by raw query text, FIFO eviction
pub struct AstCache {
    inner: Mutex<AstCacheInner>,
    capacity: usize,
}

struct AstCacheInner {
    entries: HashMap<String, BooleanNode>,
    order: VecDeque<String>,
}

impl AstCache {
    pub fn new(capacity: usize) -> Self {
        AstCache {
            inner: Mutex::new(AstCacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, query: &str) -> Option<BooleanNode> {
        self.inner.lock().entries.get(query).cloned()
    }

    pub fn put(&self, query: String, node: BooleanNode) {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&query) {
            return;
        }
        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        inner.order.push_back(query.clone());
        inner.entries.insert(query, node);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}
