use std::collections::HashMap;

use crate::analysis::tokenizer::Tokenizer;
use crate::core::types::Entity;
use crate::scoring::scorer::{DocStats, Scorer};

/// Inverted index over entity text
///
/// Maps `term -> {entity -> term frequency}` and tracks per-entity document
/// length plus a running token total for the average-length statistic.
/// Document frequency of a term is the posting length, so it always equals
/// the number of distinct indexed entities containing the term.
pub struct InvertedIndex {
    postings: HashMap<String, HashMap<String, u32>>,
    doc_terms: HashMap<String, Vec<String>>,
    doc_lengths: HashMap<String, usize>,
    total_tokens: usize,
    tokenizer: Tokenizer,
}

impl InvertedIndex {
    pub fn new(tokenizer: Tokenizer) -> Self {
        InvertedIndex {
            postings: HashMap::new(),
            doc_terms: HashMap::new(),
            doc_lengths: HashMap::new(),
            total_tokens: 0,
            tokenizer,
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Index an entity's combined text; re-indexes if already present
    pub fn add_entity(&mut self, entity: &Entity) {
        if self.doc_terms.contains_key(&entity.name) {
            self.remove_entity(&entity.name);
        }

        let tokens = self.tokenizer.tokenize(&entity.combined_text());
        let mut frequencies: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *frequencies.entry(token.clone()).or_insert(0) += 1;
        }

        let mut distinct: Vec<String> = frequencies.keys().cloned().collect();
        distinct.sort_unstable();
        for (term, tf) in frequencies {
            self.postings
                .entry(term)
                .or_default()
                .insert(entity.name.clone(), tf);
        }
        self.doc_lengths.insert(entity.name.clone(), tokens.len());
        self.total_tokens += tokens.len();
        self.doc_terms.insert(entity.name.clone(), distinct);
    }

    /// Reverse an entity's contributions; returns false if it was not indexed
    pub fn remove_entity(&mut self, name: &str) -> bool {
        let Some(terms) = self.doc_terms.remove(name) else {
            return false;
        };
        for term in terms {
            if let Some(posting) = self.postings.get_mut(&term) {
                posting.remove(name);
                if posting.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        if let Some(length) = self.doc_lengths.remove(name) {
            self.total_tokens -= length;
        }
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.doc_terms.contains_key(name)
    }

    /// Maintenance operation: drop everything and index the given entities
    pub fn rebuild<'a>(&mut self, entities: impl Iterator<Item = &'a Entity>) {
        self.postings.clear();
        self.doc_terms.clear();
        self.doc_lengths.clear();
        self.total_tokens = 0;
        for entity in entities {
            self.add_entity(entity);
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn doc_freq(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, HashMap::len)
    }

    pub fn doc_length(&self, name: &str) -> usize {
        self.doc_lengths.get(name).copied().unwrap_or(0)
    }

    pub fn avg_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_tokens as f32 / self.doc_lengths.len() as f32
        }
    }

    pub fn posting(&self, term: &str) -> Option<&HashMap<String, u32>> {
        self.postings.get(term)
    }

    /// Score every entity matching at least one query term
    ///
    /// Contributions of matched terms are summed per entity, so score
    /// distributions cover the full candidate pool before any filtering.
    pub fn score_all(&self, query: &str, scorer: &dyn Scorer) -> HashMap<String, f32> {
        let query_terms = self.tokenizer.tokenize(query);
        let mut scores: HashMap<String, f32> = HashMap::new();

        for term in &query_terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let df = posting.len();
            for (name, tf) in posting {
                let stats = DocStats {
                    doc_length: self.doc_length(name),
                    avg_doc_length: self.avg_doc_length(),
                    total_docs: self.doc_count(),
                };
                *scores.entry(name.clone()).or_insert(0.0) +=
                    scorer.score_term(*tf, df, &stats);
            }
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::scorer::TfIdfScorer;

    fn entity(name: &str, obs: &str) -> Entity {
        Entity::new(name, "note").with_observations([obs])
    }

    fn index_with(entities: &[Entity]) -> InvertedIndex {
        let mut index = InvertedIndex::new(Tokenizer::default());
        for e in entities {
            index.add_entity(e);
        }
        index
    }

    #[test]
    fn doc_freq_counts_distinct_entities() {
        let index = index_with(&[
            entity("A", "budget travel hotel"),
            entity("B", "budget travel"),
            entity("C", "enterprise budget"),
        ]);
        assert_eq!(index.doc_freq("budget"), 3);
        assert_eq!(index.doc_freq("travel"), 2);
        assert_eq!(index.doc_freq("hotel"), 1);
        assert_eq!(index.doc_freq("missing"), 0);
    }

    #[test]
    fn remove_reverses_add_exactly() {
        let mut index = index_with(&[
            entity("A", "budget travel"),
            entity("B", "budget cruise"),
        ]);
        assert!(index.remove_entity("A"));
        assert_eq!(index.doc_freq("budget"), 1);
        assert_eq!(index.doc_freq("travel"), 0);
        assert_eq!(index.doc_count(), 1);
        assert!(!index.remove_entity("A"));
    }

    #[test]
    fn avg_doc_length_tracks_population() {
        let mut index = index_with(&[
            entity("A", "alpha beta gamma delta"),
            entity("B", "alpha beta"),
        ]);
        // note entity text also includes name + type tokens that pass filters
        let avg_before = index.avg_doc_length();
        index.remove_entity("A");
        let avg_after = index.avg_doc_length();
        assert!(avg_before > avg_after);
        index.remove_entity("B");
        assert_eq!(index.avg_doc_length(), 0.0);
    }

    #[test]
    fn reindex_replaces_old_postings() {
        let mut index = InvertedIndex::new(Tokenizer::default());
        index.add_entity(&entity("A", "budget travel"));
        index.add_entity(&entity("A", "luxury cruise"));
        assert_eq!(index.doc_freq("budget"), 0);
        assert_eq!(index.doc_freq("luxury"), 1);
        assert_eq!(index.doc_count(), 1);
    }

    #[test]
    fn rebuild_equals_incremental_build() {
        let entities = vec![
            entity("A", "budget travel hotel"),
            entity("B", "budget travel"),
        ];
        let incremental = index_with(&entities);
        let mut rebuilt = InvertedIndex::new(Tokenizer::default());
        rebuilt.rebuild(entities.iter());

        for term in ["budget", "travel", "hotel"] {
            assert_eq!(incremental.doc_freq(term), rebuilt.doc_freq(term));
        }
        assert_eq!(incremental.doc_count(), rebuilt.doc_count());
    }

    #[test]
    fn score_all_covers_partial_matches() {
        let index = index_with(&[
            entity("A", "budget travel hotel"),
            entity("B", "budget travel"),
            entity("C", "enterprise budget"),
        ]);
        let scores = index.score_all("budget travel", &TfIdfScorer);
        assert_eq!(scores.len(), 3);
        assert!(scores["A"] > scores["C"]);
        assert!(scores["B"] > scores["C"]);
    }

    #[test]
    fn stop_words_never_reach_postings() {
        let index = index_with(&[entity("A", "the cat and the hat")]);
        assert_eq!(index.doc_freq("the"), 0);
        assert_eq!(index.doc_freq("cat"), 1);
    }
}
