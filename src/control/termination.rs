use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::control::adequacy::{AdequacyEvaluator, AdequacyReport, ResultMeta};
use crate::core::cancel::CancellationToken;
use crate::core::config::{HybridConfig, TerminationConfig};
use crate::core::error::{Error, Result};
use crate::query::analyzer::InfoType;
use crate::search::hybrid::{HybridHit, HybridScorer, LayerKind, LayerScores};

/// One executable scoring signal
pub trait SearchLayer: Send + Sync {
    fn kind(&self) -> LayerKind;

    /// Raw per-entity scores for the query, capped at `limit` candidates
    fn run(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<HashMap<String, f32>>;
}

/// Outcome of an ordered multi-layer execution
#[derive(Debug, Serialize)]
pub struct TerminationOutcome {
    #[serde(skip)]
    pub results: Vec<HybridHit>,
    pub executed_layers: Vec<LayerKind>,
    /// Layers that failed or timed out, with the reason
    pub failed_layers: Vec<(LayerKind, String)>,
    pub early_terminated: bool,
    pub execution_time_ms: u64,
    pub adequacy: AdequacyReport,
}

/// Ordered multi-layer execution with adequacy gating
///
/// Layers run in ascending estimated cost (symbolic < lexical < semantic).
/// After each layer the accumulated pool is fused and checked for adequacy;
/// clearing the threshold skips the remaining, costlier layers. A failing
/// or timed-out layer is recorded and dropped while the rest still run.
pub struct EarlyTerminationManager {
    config: TerminationConfig,
    evaluator: AdequacyEvaluator,
    scorer: HybridScorer,
}

impl EarlyTerminationManager {
    pub fn new(config: TerminationConfig, hybrid: HybridConfig) -> Self {
        EarlyTerminationManager {
            evaluator: AdequacyEvaluator::new(config),
            scorer: HybridScorer::new(hybrid),
            config,
        }
    }

    pub fn execute(
        &self,
        query: &str,
        limit: usize,
        layers: &[&dyn SearchLayer],
        required: &[InfoType],
        resolver: &dyn Fn(&str) -> Option<(String, String)>,
        token: &CancellationToken,
    ) -> Result<TerminationOutcome> {
        let started = Instant::now();

        let mut ordered: Vec<&&dyn SearchLayer> = layers.iter().collect();
        ordered.sort_by_key(|layer| layer.kind().estimated_cost());

        let mut accumulated: Vec<LayerScores> = Vec::new();
        let mut executed_layers = Vec::new();
        let mut failed_layers = Vec::new();
        let mut early_terminated = false;
        let mut fused: Vec<HybridHit> = Vec::new();
        let mut adequacy = self.evaluator.evaluate(&[], required);

        for (position, layer) in ordered.iter().enumerate() {
            token.check()?;
            let kind = layer.kind();

            let layer_token = match self.config.layer_timeout_ms {
                Some(ms) => token.child_with_timeout(Duration::from_millis(ms)),
                None => token.child(),
            };

            match layer.run(query, limit, &layer_token) {
                Ok(scores) => {
                    debug!(layer = %kind, candidates = scores.len(), "layer executed");
                    executed_layers.push(kind);
                    accumulated.push(LayerScores::new(kind, scores));
                }
                Err(Error::Cancelled) if token.is_cancelled() => {
                    // caller cancellation, not a per-layer timeout
                    return Err(Error::Cancelled);
                }
                Err(err) => {
                    warn!(layer = %kind, error = %err, "layer dropped");
                    failed_layers.push((kind, err.to_string()));
                    continue;
                }
            }

            // entities seen in earlier layers dedup through fusion, which
            // unions their matched layers
            fused = self.scorer.fuse(&accumulated);
            let metas = resolve_metas(&fused, resolver);
            adequacy = self.evaluator.evaluate(&metas, required);

            let layers_remain = position + 1 < ordered.len();
            if layers_remain && self.evaluator.should_terminate(&adequacy) {
                debug!(
                    score = adequacy.score,
                    executed = executed_layers.len(),
                    "adequate, skipping remaining layers"
                );
                early_terminated = true;
                break;
            }
        }

        Ok(TerminationOutcome {
            results: fused,
            executed_layers,
            failed_layers,
            early_terminated,
            execution_time_ms: started.elapsed().as_millis() as u64,
            adequacy,
        })
    }
}

/// Resolve fused hits against the graph; entities deleted between retrieval
/// and fusion simply drop out
pub fn resolve_metas(
    hits: &[HybridHit],
    resolver: &dyn Fn(&str) -> Option<(String, String)>,
) -> Vec<ResultMeta> {
    hits.iter()
        .filter_map(|hit| {
            resolver(&hit.name).map(|(entity_type, text)| ResultMeta {
                name: hit.name.clone(),
                combined: hit.combined,
                entity_type,
                text,
                matched_layer_count: hit.matched_layers.len(),
            })
        })
        .collect()
}
