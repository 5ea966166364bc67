use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::core::config::HybridConfig;

/// One of the three scoring signals fused by the hybrid scorer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Symbolic,
    Lexical,
    Semantic,
}

impl LayerKind {
    /// Relative execution cost used for layer ordering
    pub fn estimated_cost(&self) -> u32 {
        match self {
            LayerKind::Symbolic => 1,
            LayerKind::Lexical => 2,
            LayerKind::Semantic => 3,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LayerKind::Symbolic => "symbolic",
            LayerKind::Lexical => "lexical",
            LayerKind::Semantic => "semantic",
        };
        write!(f, "{label}")
    }
}

/// Raw scores from one executed layer
#[derive(Debug, Clone)]
pub struct LayerScores {
    pub kind: LayerKind,
    pub scores: HashMap<String, f32>,
}

impl LayerScores {
    pub fn new(kind: LayerKind, scores: HashMap<String, f32>) -> Self {
        LayerScores { kind, scores }
    }
}

/// Fused result for one entity with the explanation payload
#[derive(Debug, Clone, Serialize)]
pub struct HybridHit {
    pub name: String,
    pub combined: f32,
    pub matched_layers: Vec<LayerKind>,
    pub raw_scores: BTreeMap<LayerKind, f32>,
    pub normalized_scores: BTreeMap<LayerKind, f32>,
}

/// Weights actually applied after redistribution, for explanation
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveWeights {
    pub weights: BTreeMap<LayerKind, f32>,
    pub redistributed: bool,
}

/// Min–max normalisation and weighted fusion of up to three layers
///
/// Pure: output depends only on the input layers and the configuration.
pub struct HybridScorer {
    config: HybridConfig,
}

impl HybridScorer {
    pub fn new(config: HybridConfig) -> Self {
        HybridScorer { config }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    fn base_weight(&self, kind: LayerKind) -> f32 {
        match kind {
            LayerKind::Semantic => self.config.semantic_weight,
            LayerKind::Lexical => self.config.lexical_weight,
            LayerKind::Symbolic => self.config.symbolic_weight,
        }
    }

    /// Weights over the present layers; absent layers' weight is
    /// re-proportioned when `normalize_weights` is enabled
    pub fn effective_weights(&self, present: &[LayerKind]) -> EffectiveWeights {
        let mut weights = BTreeMap::new();
        let present_sum: f32 = present.iter().map(|&k| self.base_weight(k)).sum();
        let all_present = present.len() == 3;

        for &kind in present {
            let base = self.base_weight(kind);
            let weight = if self.config.normalize_weights && !all_present && present_sum > 0.0
            {
                base / present_sum
            } else {
                base
            };
            weights.insert(kind, weight);
        }
        EffectiveWeights {
            weights,
            redistributed: self.config.normalize_weights && !all_present,
        }
    }

    pub fn fuse(&self, layers: &[LayerScores]) -> Vec<HybridHit> {
        // layers with no scores are absent; their weight redistributes
        let present: Vec<&LayerScores> =
            layers.iter().filter(|l| !l.scores.is_empty()).collect();
        if present.is_empty() {
            return Vec::new();
        }
        let present_kinds: Vec<LayerKind> = present.iter().map(|l| l.kind).collect();
        let effective = self.effective_weights(&present_kinds);

        // 1. min–max normalise each layer to [0, 1]
        let mut normalized: HashMap<LayerKind, HashMap<&str, f32>> = HashMap::new();
        for layer in &present {
            normalized.insert(layer.kind, min_max(&layer.scores));
        }

        // 2. weighted combination over every entity seen in any layer
        let mut names: Vec<&str> = present
            .iter()
            .flat_map(|l| l.scores.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();

        let mut hits: Vec<HybridHit> = names
            .into_iter()
            .map(|name| {
                let mut combined = 0.0;
                let mut matched_layers = Vec::new();
                let mut raw_scores = BTreeMap::new();
                let mut normalized_scores = BTreeMap::new();

                for layer in &present {
                    let Some(&raw) = layer.scores.get(name) else {
                        continue;
                    };
                    let norm = normalized[&layer.kind][name];
                    let weight = effective.weights[&layer.kind];
                    combined += weight * norm;
                    matched_layers.push(layer.kind);
                    raw_scores.insert(layer.kind, raw);
                    normalized_scores.insert(layer.kind, norm);
                }
                HybridHit {
                    name: name.to_string(),
                    combined,
                    matched_layers,
                    raw_scores,
                    normalized_scores,
                }
            })
            .filter(|hit| !hit.matched_layers.is_empty())
            .filter(|hit| hit.combined >= self.config.min_score)
            .collect();

        // 3. combined descending, ties by name ascending
        hits.sort_by(|a, b| {
            b.combined
                .partial_cmp(&a.combined)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        hits
    }
}

/// Min–max to [0, 1]; a degenerate layer maps to 0 when all-zero, else 1
fn min_max(scores: &HashMap<String, f32>) -> HashMap<&str, f32> {
    let min = scores.values().copied().fold(f32::INFINITY, f32::min);
    let max = scores.values().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    scores
        .iter()
        .map(|(name, &score)| {
            let norm = if range > 0.0 {
                (score - min) / range
            } else if score == 0.0 {
                0.0
            } else {
                1.0
            };
            (name.as_str(), norm)
        })
        .collect()
}
