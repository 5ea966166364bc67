use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::control::adequacy::{AdequacyEvaluator, AdequacyReport};
use crate::control::termination::resolve_metas;
use crate::core::cancel::CancellationToken;
use crate::core::config::{ReflectionConfig, TerminationConfig};
use crate::core::error::Result;
use crate::query::analyzer::{InfoType, focus_keywords};
use crate::search::hybrid::HybridHit;

/// One iteration of the refinement loop
#[derive(Debug, Clone, Serialize)]
pub struct RefinementStep {
    pub iteration: usize,
    pub query: String,
    pub limit: usize,
    pub results_found: usize,
    pub adequacy_score: f32,
    pub refinement_reason: Option<String>,
    pub missing_info_types: Option<Vec<InfoType>>,
}

/// Outcome of the reflection loop
#[derive(Debug, Serialize)]
pub struct ReflectionOutcome {
    #[serde(skip)]
    pub results: Vec<HybridHit>,
    pub refinement_history: Vec<RefinementStep>,
    pub final_limit: usize,
    pub iterations: usize,
    pub adequate: bool,
    pub adequacy: AdequacyReport,
}

/// Iterative refinement with progressive widening
///
/// Each iteration issues a hybrid query with limit
/// `ceil(initial * factor^i)`, unions and deduplicates results, and when
/// inadequate refines the query by appending keywords for the unsatisfied
/// info types. Stops when adequate or at `max_iterations`.
pub struct ReflectionManager {
    config: ReflectionConfig,
    evaluator: AdequacyEvaluator,
}

impl ReflectionManager {
    pub fn new(config: ReflectionConfig, termination: TerminationConfig) -> Self {
        ReflectionManager {
            config,
            evaluator: AdequacyEvaluator::new(termination),
        }
    }

    pub fn execute(
        &self,
        query: &str,
        required: &[InfoType],
        executor: &dyn Fn(&str, usize, &CancellationToken) -> Result<Vec<HybridHit>>,
        resolver: &dyn Fn(&str) -> Option<(String, String)>,
        token: &CancellationToken,
    ) -> Result<ReflectionOutcome> {
        let mut current_query = query.to_string();
        let mut history = Vec::new();
        let mut pool: HashMap<String, HybridHit> = HashMap::new();
        let mut final_limit = self.config.initial_limit;
        let mut adequacy = self.evaluator.evaluate(&[], required);
        let mut adequate = false;

        for iteration in 0..self.config.max_iterations.max(1) {
            token.check()?;

            let limit = widened_limit(
                self.config.initial_limit,
                self.config.limit_increase_factor,
                iteration,
            );
            final_limit = limit;

            let found = executor(&current_query, limit, token)?;
            let results_found = found.len();
            for hit in found {
                // union: keep the better score, merge matched layers
                pool.entry(hit.name.clone())
                    .and_modify(|existing| {
                        if hit.combined > existing.combined {
                            existing.combined = hit.combined;
                            existing.normalized_scores = hit.normalized_scores.clone();
                            existing.raw_scores = hit.raw_scores.clone();
                        }
                        for layer in &hit.matched_layers {
                            if !existing.matched_layers.contains(layer) {
                                existing.matched_layers.push(*layer);
                            }
                        }
                    })
                    .or_insert(hit);
            }

            let merged = sorted_pool(&pool);
            let metas = resolve_metas(&merged, resolver);
            adequacy = self.evaluator.evaluate(&metas, required);
            adequate = adequacy.adequate || self.evaluator.should_terminate(&adequacy);

            let mut step = RefinementStep {
                iteration,
                query: current_query.clone(),
                limit,
                results_found,
                adequacy_score: adequacy.score,
                refinement_reason: None,
                missing_info_types: None,
            };

            let last_iteration = iteration + 1 >= self.config.max_iterations.max(1);
            if adequate {
                history.push(step);
                debug!(iteration, score = adequacy.score, "reflection adequate");
                break;
            }
            if !last_iteration {
                let (refined, reason) =
                    self.refine(&current_query, &adequacy);
                step.refinement_reason = reason;
                step.missing_info_types = Some(adequacy.missing_info_types.clone());
                if refined != current_query {
                    debug!(iteration, refined = %refined, "query refined");
                    current_query = refined;
                }
            }
            history.push(step);
        }

        let iterations = history.len();
        Ok(ReflectionOutcome {
            results: sorted_pool(&pool),
            refinement_history: history,
            final_limit,
            iterations,
            adequate,
            adequacy,
        })
    }

    /// Append keywords for the unsatisfied info types when enabled
    fn refine(&self, query: &str, adequacy: &AdequacyReport) -> (String, Option<String>) {
        if !self.config.focus_missing_types || adequacy.missing_info_types.is_empty() {
            return (
                query.to_string(),
                Some("widening result limit".to_string()),
            );
        }
        let lower = query.to_lowercase();
        let mut additions: Vec<&str> = Vec::new();
        for &info in &adequacy.missing_info_types {
            additions.extend(
                focus_keywords(info)
                    .iter()
                    .copied()
                    .filter(|kw| !lower.contains(kw)),
            );
        }
        if additions.is_empty() {
            return (
                query.to_string(),
                Some("widening result limit".to_string()),
            );
        }
        let reason = format!(
            "targeting missing info types: {}",
            adequacy
                .missing_info_types
                .iter()
                .map(|t| format!("{t:?}").to_lowercase())
                .collect::<Vec<_>>()
                .join(", ")
        );
        (format!("{query} {}", additions.join(" ")), Some(reason))
    }
}

/// `ceil(initial * factor^iteration)`, never shrinking below the initial
fn widened_limit(initial: usize, factor: f32, iteration: usize) -> usize {
    let widened = initial as f32 * factor.max(1.0).powi(iteration as i32);
    widened.ceil() as usize
}

fn sorted_pool(pool: &HashMap<String, HybridHit>) -> Vec<HybridHit> {
    let mut merged: Vec<HybridHit> = pool.values().cloned().collect();
    merged.sort_by(|a, b| {
        b.combined
            .partial_cmp(&a.combined)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    merged
}
