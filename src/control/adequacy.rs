use serde::Serialize;
use std::collections::HashSet;

use crate::core::config::TerminationConfig;
use crate::query::analyzer::{InfoType, focus_keywords};

/// Minimal view of a fused result needed for adequacy checks
#[derive(Debug, Clone)]
pub struct ResultMeta {
    pub name: String,
    pub combined: f32,
    pub entity_type: String,
    /// Lower-cased combined text of the entity
    pub text: String,
    pub matched_layer_count: usize,
}

/// Composite judgment of whether a result set is good enough to stop
#[derive(Debug, Clone, Serialize)]
pub struct AdequacyReport {
    /// Weighted combination of the component scores, in [0, 1]
    pub score: f32,
    /// All four conditions hold strictly
    pub adequate: bool,
    pub result_count: usize,
    pub mean_relevance: f32,
    pub coverage: f32,
    pub diversity: f32,
    pub missing_info_types: Vec<InfoType>,
}

/// Evaluates result sets against the termination thresholds
///
/// Components: result count, mean top-k relevance, required-info-type
/// coverage, and diversity (entity types and contributing layers).
pub struct AdequacyEvaluator {
    config: TerminationConfig,
}

impl AdequacyEvaluator {
    pub fn new(config: TerminationConfig) -> Self {
        AdequacyEvaluator { config }
    }

    pub fn evaluate(&self, results: &[ResultMeta], required: &[InfoType]) -> AdequacyReport {
        let count = results.len();
        let count_score = if self.config.min_results == 0 {
            1.0
        } else {
            (count as f32 / self.config.min_results as f32).min(1.0)
        };

        let top_k = self.config.min_results.max(1).min(count.max(1));
        let mean_relevance = if count == 0 {
            0.0
        } else {
            results.iter().take(top_k).map(|r| r.combined).sum::<f32>() / top_k as f32
        };
        let relevance_score = if self.config.min_relevance <= 0.0 {
            1.0
        } else {
            (mean_relevance / self.config.min_relevance).min(1.0)
        };

        let missing_info_types: Vec<InfoType> = required
            .iter()
            .copied()
            .filter(|&info| !results.iter().any(|r| covers(r, info)))
            .collect();
        let coverage = if required.is_empty() {
            1.0
        } else {
            (required.len() - missing_info_types.len()) as f32 / required.len() as f32
        };

        let diversity = diversity_of(results);

        let score = 0.3 * count_score + 0.3 * relevance_score + 0.2 * coverage + 0.2 * diversity;
        let adequate = count >= self.config.min_results
            && mean_relevance >= self.config.min_relevance
            && missing_info_types.is_empty()
            && diversity >= self.config.min_diversity;

        AdequacyReport {
            score,
            adequate,
            result_count: count,
            mean_relevance,
            coverage,
            diversity,
            missing_info_types,
        }
    }

    /// Termination gate: stop once the composite score clears the threshold
    pub fn should_terminate(&self, report: &AdequacyReport) -> bool {
        report.score >= self.config.adequacy_threshold
    }
}

/// A result covers an info type when its entity type names the category or
/// its text carries one of the type's focus keywords
fn covers(result: &ResultMeta, info: InfoType) -> bool {
    let type_label = match info {
        InfoType::Person => "person",
        InfoType::Location => "location",
        InfoType::Organization => "organization",
        InfoType::Temporal => "event",
        InfoType::Numeric => "metric",
        InfoType::Causal => "cause",
    };
    if result.entity_type.eq_ignore_ascii_case(type_label) {
        return true;
    }
    match info {
        InfoType::Temporal => {
            result.text.contains("date")
                || result.text.contains("when")
                || contains_year(&result.text)
        }
        InfoType::Numeric => result.text.chars().any(|c| c.is_ascii_digit()),
        _ => focus_keywords(info)
            .iter()
            .any(|kw| result.text.contains(kw)),
    }
}

fn contains_year(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.windows(4).any(|w| {
        w.iter().all(u8::is_ascii_digit) && (w.starts_with(b"19") || w.starts_with(b"20"))
    })
}

/// Mean of distinct-entity-type ratio and distinct-layer ratio
fn diversity_of(results: &[ResultMeta]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    let distinct_types: HashSet<&str> =
        results.iter().map(|r| r.entity_type.as_str()).collect();
    let type_ratio = distinct_types.len() as f32 / results.len() as f32;

    let max_layers = results
        .iter()
        .map(|r| r.matched_layer_count)
        .max()
        .unwrap_or(0);
    let layer_ratio = (max_layers as f32 / 3.0).min(1.0);

    (type_ratio + layer_ratio) / 2.0
}
