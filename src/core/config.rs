use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::analysis::stopwords;

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tfidf: TfIdfConfig,
    pub bm25: Bm25Config,
    pub fuzzy: FuzzyConfig,
    pub boolean: BooleanConfig,
    pub hybrid: HybridConfig,
    pub plan_cache: PlanCacheConfig,
    pub termination: TerminationConfig,
    pub reflection: ReflectionConfig,
    pub result_cache: ResultCacheConfig,
    pub pagination: PaginationConfig,
    pub limits: EntityLimits,
    pub trace: TraceConfig,
}

/// Tokenization and TF-IDF indexing options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TfIdfConfig {
    pub min_term_length: usize,
    pub stopwords: HashSet<String>,
}

impl Default for TfIdfConfig {
    fn default() -> Self {
        TfIdfConfig {
            min_term_length: 3,
            stopwords: stopwords::english(),
        }
    }
}

/// Okapi BM25 parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config {
            k1: 1.2,
            b: 0.75,
        }
    }
}

/// Fuzzy (edit-distance) search options
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    pub threshold: f32,
    pub use_worker_pool: bool,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        FuzzyConfig {
            threshold: 0.7,
            use_worker_pool: true,
        }
    }
}

/// Boolean query complexity limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BooleanConfig {
    pub max_depth: usize,
    pub max_terms: usize,
    pub max_operators: usize,
    pub max_query_length: usize,
}

impl Default for BooleanConfig {
    fn default() -> Self {
        BooleanConfig {
            max_depth: 10,
            max_terms: 50,
            max_operators: 50,
            max_query_length: 1000,
        }
    }
}

/// Hybrid fusion weights and cutoff
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    pub symbolic_weight: f32,
    pub min_score: f32,
    pub normalize_weights: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        HybridConfig {
            semantic_weight: 0.4,
            lexical_weight: 0.4,
            symbolic_weight: 0.2,
            min_score: 0.0,
            normalize_weights: true, // redistribute weights of absent layers
        }
    }
}

/// Query plan cache sizing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanCacheConfig {
    pub max_size: usize,
    pub ttl_ms: u64,
    pub normalize_queries: bool,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        PlanCacheConfig {
            max_size: 100,
            ttl_ms: 300_000, // 5 minutes
            normalize_queries: true,
        }
    }
}

/// Early-termination adequacy gating
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    pub adequacy_threshold: f32,
    pub min_results: usize,
    pub min_relevance: f32,
    pub min_diversity: f32,
    pub layer_timeout_ms: Option<u64>,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        TerminationConfig {
            adequacy_threshold: 0.7,
            min_results: 3,
            min_relevance: 0.5,
            min_diversity: 0.3,
            layer_timeout_ms: Some(5000),
        }
    }
}

/// Reflection loop widening
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub max_iterations: usize,
    pub initial_limit: usize,
    pub limit_increase_factor: f32,
    pub focus_missing_types: bool,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        ReflectionConfig {
            max_iterations: 3,
            initial_limit: 10,
            limit_increase_factor: 1.5,
            focus_missing_types: true,
        }
    }
}

/// Per-retriever result cache sizing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultCacheConfig {
    pub size: usize,
    pub ttl_ms: u64,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        ResultCacheConfig {
            size: 256,
            ttl_ms: 300_000, // 5 minutes
        }
    }
}

/// Pagination clamps
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            default_limit: 50,
            max_limit: 200,
        }
    }
}

/// Entity field constraints
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityLimits {
    pub max_name_length: usize,
    pub max_observation_length: usize,
}

impl Default for EntityLimits {
    fn default() -> Self {
        EntityLimits {
            max_name_length: 500,
            max_observation_length: 2000,
        }
    }
}

/// Query trace recording
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            enabled: false,
            capacity: 128,
        }
    }
}
