use std::sync::Arc;
use std::time::Instant;

use crate::analysis::distance::similarity;
use crate::core::config::FuzzyConfig;
use crate::core::types::LowercasedEntity;
use crate::graph::index::GraphIndex;
use crate::ports::WorkerPool;
use crate::search::filter::{Page, SearchFilter};
use crate::search::results::{SearchHit, SearchResults, assemble};

/// Which entity field produced the winning similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchField {
    Name,
    Observation,
}

/// Edit-distance search with an optional compute fan-out
///
/// `similarity = 1 - lev(query, candidate) / max(|query|, |candidate|)`
/// over lower-cased inputs; a substring containment short-circuits to 1.0.
/// Name matches rank strictly above observation matches of equal
/// similarity. The worker pool maps entity chunks and merges chunk outputs
/// in candidate order, so scoring is deterministic either way.
pub struct FuzzySearch<'a> {
    graph: &'a GraphIndex,
    config: FuzzyConfig,
    pool: &'a dyn WorkerPool,
}

impl<'a> FuzzySearch<'a> {
    pub fn new(graph: &'a GraphIndex, config: FuzzyConfig, pool: &'a dyn WorkerPool) -> Self {
        FuzzySearch {
            graph,
            config,
            pool,
        }
    }

    pub fn search(&self, query: &str, filter: &SearchFilter, page: Page) -> SearchResults {
        let started = Instant::now();
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return SearchResults::empty();
        }

        let candidates: Vec<(String, Arc<LowercasedEntity>)> = self
            .graph
            .names_in_order()
            .iter()
            .filter_map(|name| {
                self.graph
                    .get_lowercased(name)
                    .map(|lower| (name.clone(), lower))
            })
            .collect();

        let chunk_size = chunk_size_for(candidates.len());
        let name_job = |range: std::ops::Range<usize>| -> Vec<(usize, f32)> {
            range
                .map(|i| (i, field_similarity(&needle, &candidates[i].1.name)))
                .collect()
        };
        let name_scores = self
            .pool
            .map_ranges(candidates.len(), chunk_size, &name_job);

        let observation_job = |range: std::ops::Range<usize>| -> Vec<(usize, f32)> {
            range
                .map(|i| {
                    let best = candidates[i]
                        .1
                        .observations
                        .iter()
                        .map(|obs| field_similarity(&needle, obs))
                        .fold(0.0f32, f32::max);
                    (i, best)
                })
                .collect()
        };
        let observation_scores =
            self.pool
                .map_ranges(candidates.len(), chunk_size, &observation_job);

        // merge preserves candidate order; prefer name matches on ties
        let mut matched: Vec<(SearchHit, MatchField)> = Vec::new();
        for ((i, name_sim), (_, obs_sim)) in name_scores.into_iter().zip(observation_scores) {
            let (score, field) = if name_sim >= obs_sim {
                (name_sim, MatchField::Name)
            } else {
                (obs_sim, MatchField::Observation)
            };
            if score < self.config.threshold {
                continue;
            }
            if let Some(entity) = self.graph.get_by_name(&candidates[i].0) {
                matched.push((
                    SearchHit {
                        entity: entity.clone(),
                        score,
                    },
                    field,
                ));
            }
        }

        matched.sort_by(|(a, a_field), (b, b_field)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| match (a_field, b_field) {
                    (MatchField::Name, MatchField::Observation) => std::cmp::Ordering::Less,
                    (MatchField::Observation, MatchField::Name) => std::cmp::Ordering::Greater,
                    _ => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.entity.name.cmp(&b.entity.name))
        });

        let hits = matched.into_iter().map(|(hit, _)| hit).collect();
        assemble(hits, filter, page, self.graph, started)
    }
}

/// Containment short-circuits to 1.0, otherwise normalized edit distance
fn field_similarity(needle: &str, candidate: &str) -> f32 {
    if candidate.contains(needle) {
        return 1.0;
    }
    similarity(needle, candidate)
}

fn chunk_size_for(total: usize) -> usize {
    let workers = num_cpus::get().max(1) * 4;
    (total / workers).max(16)
}
