use chrono::Utc;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::analysis::tokenizer::Tokenizer;
use crate::control::reflection::{ReflectionManager, RefinementStep};
use crate::control::termination::{EarlyTerminationManager, SearchLayer};
use crate::core::cancel::CancellationToken;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::Entity;
use crate::graph::events::{ChangeEvent, GraphListener};
use crate::graph::index::GraphIndex;
use crate::index::inverted::InvertedIndex;
use crate::index::vector::VectorStore;
use crate::ports::{Embedder, RayonWorkerPool, SerialWorkerPool};
use crate::query::analyzer::{QueryAnalysis, QueryAnalyzer};
use crate::query::matcher::AstCache;
use crate::query::parser::QueryParser;
use crate::query::plan_cache::{PlanCacheStats, QueryPlanCache};
use crate::query::planner::{ExecutionStrategy, QueryPlan, QueryPlanner};
use crate::query::trace::{QueryTrace, TraceLog, trace_record};
use crate::scoring::scorer::{Bm25Scorer, TfIdfScorer};
use crate::search::basic::BasicSearch;
use crate::search::boolean::BooleanSearch;
use crate::search::cache::{CacheStats, SearchCache};
use crate::search::filter::{Page, SearchFilter};
use crate::search::fuzzy::FuzzySearch;
use crate::search::hybrid::{EffectiveWeights, HybridHit, HybridScorer, LayerKind, LayerScores};
use crate::search::ranked::RankedSearch;
use crate::search::results::{SearchHit, SearchResults, assemble};
use crate::search::semantic::SemanticSearch;

/// Keeps the inverted index and vector store consistent with the graph
///
/// Runs inside the writer's critical section, so it only touches its own
/// locks and never reads back into the graph. Vectors are purged on
/// text-changing updates and restored by the explicit semantic pipeline.
struct IndexMaintainer {
    inverted: Arc<RwLock<InvertedIndex>>,
    vectors: Arc<RwLock<VectorStore>>,
}

impl GraphListener for IndexMaintainer {
    fn on_change(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::Created { entity } => {
                self.inverted.write().add_entity(entity);
            }
            ChangeEvent::Updated { old, new } => {
                self.inverted.write().add_entity(new);
                if old.combined_text() != new.combined_text() {
                    self.vectors.write().remove(&new.name);
                }
            }
            ChangeEvent::Deleted { old } => {
                self.inverted.write().remove_entity(&old.name);
                self.vectors.write().remove(&old.name);
            }
        }
    }
}

/// Clears result and AST caches on any graph change
struct CacheInvalidator {
    caches: Vec<Arc<SearchCache>>,
    ast_cache: Arc<AstCache>,
}

impl GraphListener for CacheInvalidator {
    fn on_change(&self, event: &ChangeEvent) {
        debug!(entity = event.name(), "invalidating result caches");
        for cache in &self.caches {
            cache.clear();
        }
        self.ast_cache.clear();
    }
}

/// Analysis and plan for a query, with cache provenance
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub analysis: QueryAnalysis,
    pub plan: QueryPlan,
    pub cache_hit: bool,
}

/// Hybrid fusion detail for `explain`
#[derive(Debug, Serialize)]
pub struct HybridExplanation {
    pub query: String,
    pub weights: EffectiveWeights,
    pub hits: Vec<HybridHit>,
}

/// How a planned search was executed
#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionReport {
    Terminated {
        executed_layers: Vec<LayerKind>,
        early_terminated: bool,
        adequacy_score: f32,
    },
    Reflected {
        iterations: usize,
        final_limit: usize,
        adequate: bool,
        history: Vec<RefinementStep>,
    },
    Fanned {
        sub_queries: usize,
    },
}

/// Result bundle of the planner-driven entry point
#[derive(Debug, Serialize)]
pub struct PlannedSearch {
    pub analysis: QueryAnalysis,
    pub plan: QueryPlan,
    pub results: SearchResults,
    pub report: ExecutionReport,
}

/// Counts from a full re-index pass
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexReport {
    pub lexical: usize,
    pub semantic: usize,
}

/// Cache statistics across the service
#[derive(Debug, Serialize)]
pub struct ServiceCacheStats {
    pub basic: CacheStats,
    pub ranked: CacheStats,
    pub boolean: CacheStats,
    pub fuzzy: CacheStats,
    pub plan: PlanCacheStats,
    pub ast_entries: usize,
}

/// The search port of the engine
///
/// Wires the graph, derived indexes, per-kind result caches, the plan
/// cache, and the orchestration managers behind a narrow typed surface.
pub struct SearchService {
    config: Config,
    graph: Arc<RwLock<GraphIndex>>,
    inverted: Arc<RwLock<InvertedIndex>>,
    vectors: Arc<RwLock<VectorStore>>,
    embedder: Option<Arc<dyn Embedder>>,
    rayon_pool: RayonWorkerPool,
    serial_pool: SerialWorkerPool,
    tokenizer: Tokenizer,
    parser: QueryParser,
    analyzer: QueryAnalyzer,
    planner: QueryPlanner,
    plan_cache: QueryPlanCache,
    ast_cache: Arc<AstCache>,
    basic_cache: Arc<SearchCache>,
    ranked_cache: Arc<SearchCache>,
    boolean_cache: Arc<SearchCache>,
    fuzzy_cache: Arc<SearchCache>,
    trace: TraceLog,
}

impl SearchService {
    pub fn new(
        config: Config,
        graph: Arc<RwLock<GraphIndex>>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Arc<Self> {
        let tokenizer = Tokenizer::new(
            config.tfidf.min_term_length,
            config.tfidf.stopwords.clone(),
        );
        let inverted = Arc::new(RwLock::new(InvertedIndex::new(tokenizer.clone())));
        let dimension = embedder.as_ref().map_or(0, |e| e.dimension());
        let vectors = Arc::new(RwLock::new(VectorStore::new(dimension)));

        let ast_cache = Arc::new(AstCache::new(config.result_cache.size));
        let basic_cache = Arc::new(SearchCache::new(config.result_cache));
        let ranked_cache = Arc::new(SearchCache::new(config.result_cache));
        let boolean_cache = Arc::new(SearchCache::new(config.result_cache));
        // fuzzy cache is capped at 100 with mid-life cleanup at 50%
        let fuzzy_cache = Arc::new(SearchCache::with_capacity(
            100,
            config.result_cache.ttl_ms,
            true,
        ));

        {
            let guard = graph.read();
            guard.subscribe(Arc::new(IndexMaintainer {
                inverted: inverted.clone(),
                vectors: vectors.clone(),
            }));
            guard.subscribe(Arc::new(CacheInvalidator {
                caches: vec![
                    basic_cache.clone(),
                    ranked_cache.clone(),
                    boolean_cache.clone(),
                    fuzzy_cache.clone(),
                ],
                ast_cache: ast_cache.clone(),
            }));
        }

        Arc::new(SearchService {
            parser: QueryParser::new(config.boolean),
            plan_cache: QueryPlanCache::new(config.plan_cache),
            trace: TraceLog::new(config.trace),
            analyzer: QueryAnalyzer::new(),
            planner: QueryPlanner::new(),
            rayon_pool: RayonWorkerPool,
            serial_pool: SerialWorkerPool,
            tokenizer,
            config,
            graph,
            inverted,
            vectors,
            embedder,
            ast_cache,
            basic_cache,
            ranked_cache,
            boolean_cache,
            fuzzy_cache,
        })
    }

    // ------------------------------------------------------------------
    // Single-signal retrievers
    // ------------------------------------------------------------------

    pub fn basic(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        self.run_cached(&self.basic_cache, "basic", query, filter, page, |page| {
            let graph = self.graph.read();
            Ok(BasicSearch::new(&graph).search(query, filter, page))
        })
    }

    pub fn ranked(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        self.run_cached(&self.ranked_cache, "ranked", query, filter, page, |page| {
            let graph = self.graph.read();
            let inverted = self.inverted.read();
            Ok(RankedSearch::new(&graph, &inverted, &TfIdfScorer).search(query, filter, page))
        })
    }

    pub fn bm25(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        self.run_cached(&self.ranked_cache, "bm25", query, filter, page, |page| {
            let graph = self.graph.read();
            let inverted = self.inverted.read();
            let scorer = Bm25Scorer {
                k1: self.config.bm25.k1,
                b: self.config.bm25.b,
            };
            Ok(RankedSearch::new(&graph, &inverted, &scorer).search(query, filter, page))
        })
    }

    pub fn boolean(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        self.run_cached(&self.boolean_cache, "boolean", query, filter, page, |page| {
            let graph = self.graph.read();
            BooleanSearch::new(&graph, &self.parser, &self.ast_cache).search(query, filter, page)
        })
    }

    pub fn fuzzy(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        self.run_cached(&self.fuzzy_cache, "fuzzy", query, filter, page, |page| {
            let graph = self.graph.read();
            let search = if self.config.fuzzy.use_worker_pool {
                FuzzySearch::new(&graph, self.config.fuzzy, &self.rayon_pool)
            } else {
                FuzzySearch::new(&graph, self.config.fuzzy, &self.serial_pool)
            };
            Ok(search.search(query, filter, page))
        })
    }

    pub fn semantic(&self, query: &str, filter: &SearchFilter, page: Page) -> Result<SearchResults> {
        filter.validate()?;
        let page = page.clamped(&self.config.pagination);
        let started_at = Utc::now();
        let started = Instant::now();

        let results = {
            let graph = self.graph.read();
            let vectors = self.vectors.read();
            SemanticSearch::new(&graph, &vectors, self.embedder.as_deref())
                .search(query, filter, page)?
        };
        self.trace.record(trace_record(
            query,
            "semantic",
            started_at,
            started.elapsed().as_millis() as u64,
            results.hits.len(),
            false,
            vec![LayerKind::Semantic.to_string()],
        ));
        Ok(results)
    }

    // ------------------------------------------------------------------
    // Hybrid fusion
    // ------------------------------------------------------------------

    pub fn hybrid(
        &self,
        query: &str,
        filter: &SearchFilter,
        page: Page,
        token: &CancellationToken,
    ) -> Result<SearchResults> {
        filter.validate()?;
        let page = page.clamped(&self.config.pagination);
        let started_at = Utc::now();
        let started = Instant::now();

        let layers = self.collect_layers(query, self.layer_limit(), token)?;
        let fused = HybridScorer::new(self.config.hybrid).fuse(&layers);
        let results = self.fused_to_results(&fused, filter, page, started);

        self.trace.record(trace_record(
            query,
            "hybrid",
            started_at,
            started.elapsed().as_millis() as u64,
            results.hits.len(),
            false,
            layers.iter().map(|l| l.kind.to_string()).collect(),
        ));
        Ok(results)
    }

    /// Hybrid fusion detail: raw and normalized per-layer scores plus the
    /// effective weights after redistribution
    pub fn explain(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<HybridExplanation> {
        let layers = self.collect_layers(query, self.layer_limit(), token)?;
        let scorer = HybridScorer::new(self.config.hybrid);
        let present: Vec<LayerKind> = layers
            .iter()
            .filter(|l| !l.scores.is_empty())
            .map(|l| l.kind)
            .collect();
        let mut hits = scorer.fuse(&layers);
        hits.truncate(limit.max(1));
        Ok(HybridExplanation {
            query: query.to_string(),
            weights: scorer.effective_weights(&present),
            hits,
        })
    }

    // ------------------------------------------------------------------
    // Planner-driven execution
    // ------------------------------------------------------------------

    pub fn plan(&self, query: &str) -> PlanOutcome {
        if let Some(cached) = self.plan_cache.get(query) {
            return PlanOutcome {
                analysis: cached.analysis,
                plan: cached.plan,
                cache_hit: true,
            };
        }
        let analysis = self.analyzer.analyze(query);
        let plan = self.planner.plan(query, &analysis);
        self.plan_cache.put(query, analysis.clone(), plan.clone());
        PlanOutcome {
            analysis,
            plan,
            cache_hit: false,
        }
    }

    /// Execute a query the way its plan prescribes: simple plans run the
    /// layered termination controller, iterative plans run the reflection
    /// loop, parallel plans fan sub-queries out and union the pools
    pub fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        page: Page,
        token: &CancellationToken,
    ) -> Result<PlannedSearch> {
        filter.validate()?;
        let page = page.clamped(&self.config.pagination);
        let started = Instant::now();
        let outcome = self.plan(query);
        let analysis = outcome.analysis;
        let plan = outcome.plan;

        let (fused, report) = match plan.execution_strategy {
            ExecutionStrategy::Single => {
                let manager =
                    EarlyTerminationManager::new(self.config.termination, self.config.hybrid);
                let sub_query = plan
                    .sub_queries
                    .first()
                    .map_or(query, |sq| sq.query.as_str());
                let result = self.run_terminated(&manager, sub_query, &analysis, token)?;
                let report = ExecutionReport::Terminated {
                    executed_layers: result.executed_layers,
                    early_terminated: result.early_terminated,
                    adequacy_score: result.adequacy.score,
                };
                (result.results, report)
            }
            ExecutionStrategy::Iterative => {
                let manager =
                    ReflectionManager::new(self.config.reflection, self.config.termination);
                let executor = |q: &str,
                                limit: usize,
                                tok: &CancellationToken|
                 -> Result<Vec<HybridHit>> {
                    let layers = self.collect_layers(q, limit, tok)?;
                    Ok(HybridScorer::new(self.config.hybrid).fuse(&layers))
                };
                let resolver = self.meta_resolver();
                let outcome = manager.execute(
                    query,
                    &analysis.required_info_types,
                    &executor,
                    &resolver,
                    token,
                )?;
                let report = ExecutionReport::Reflected {
                    iterations: outcome.iterations,
                    final_limit: outcome.final_limit,
                    adequate: outcome.adequate,
                    history: outcome.refinement_history,
                };
                (outcome.results, report)
            }
            ExecutionStrategy::Parallel => {
                let manager =
                    EarlyTerminationManager::new(self.config.termination, self.config.hybrid);
                let pools: Vec<Vec<HybridHit>> = plan
                    .sub_queries
                    .par_iter()
                    .map(|sub_query| {
                        self.run_terminated(&manager, &sub_query.query, &analysis, token)
                            .map(|outcome| outcome.results)
                    })
                    .collect::<Result<Vec<_>>>()?;

                let mut union: HashMap<String, HybridHit> = HashMap::new();
                for hit in pools.into_iter().flatten() {
                    union
                        .entry(hit.name.clone())
                        .and_modify(|existing| {
                            if hit.combined > existing.combined {
                                *existing = hit.clone();
                            }
                        })
                        .or_insert(hit);
                }
                let mut merged: Vec<HybridHit> = union.into_values().collect();
                merged.sort_by(|a, b| {
                    b.combined
                        .partial_cmp(&a.combined)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.name.cmp(&b.name))
                });
                let report = ExecutionReport::Fanned {
                    sub_queries: plan.sub_queries.len(),
                };
                (merged, report)
            }
        };

        let results = self.fused_to_results(&fused, filter, page, started);
        Ok(PlannedSearch {
            analysis,
            plan,
            results,
            report,
        })
    }

    // ------------------------------------------------------------------
    // Index maintenance
    // ------------------------------------------------------------------

    /// Rebuild the lexical index and re-embed every entity
    pub fn index_all(&self, token: &CancellationToken) -> Result<IndexReport> {
        // snapshot under a short read lock; embedding happens lock-free
        let entities: Vec<Entity> = {
            let graph = self.graph.read();
            graph.entities_in_order().cloned().collect()
        };
        token.check()?;

        self.inverted.write().rebuild(entities.iter());
        let lexical = entities.len();

        let mut semantic = 0;
        if let Some(embedder) = self.embedder.as_deref().filter(|e| e.is_available()) {
            let mut fresh = VectorStore::new(embedder.dimension());
            for (i, entity) in entities.iter().enumerate() {
                if i % 16 == 0 {
                    token.check()?;
                }
                let vector = embedder.embed(&entity.combined_text())?;
                fresh.insert(entity.name.clone(), vector)?;
                semantic += 1;
            }
            *self.vectors.write() = fresh;
        }
        debug!(lexical, semantic, "full reindex complete");
        Ok(IndexReport { lexical, semantic })
    }

    /// (Re-)index one entity in both derived indexes
    pub fn index_entity(&self, name: &str) -> Result<()> {
        let entity = self
            .graph
            .read()
            .get_by_name(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        self.inverted.write().add_entity(&entity);
        if let Some(embedder) = self.embedder.as_deref().filter(|e| e.is_available()) {
            let vector = embedder.embed(&entity.combined_text())?;
            self.vectors.write().insert(entity.name.clone(), vector)?;
        }
        Ok(())
    }

    /// Drop an entity from the derived indexes
    pub fn remove_entity(&self, name: &str) -> Result<bool> {
        let lexical = self.inverted.write().remove_entity(name);
        let semantic = self.vectors.write().remove(name);
        Ok(lexical || semantic)
    }

    // ------------------------------------------------------------------
    // Caches and traces
    // ------------------------------------------------------------------

    pub fn cache_stats(&self) -> ServiceCacheStats {
        ServiceCacheStats {
            basic: self.basic_cache.stats(),
            ranked: self.ranked_cache.stats(),
            boolean: self.boolean_cache.stats(),
            fuzzy: self.fuzzy_cache.stats(),
            plan: self.plan_cache.stats(),
            ast_entries: self.ast_cache.len(),
        }
    }

    pub fn clear_caches(&self) {
        self.basic_cache.clear();
        self.ranked_cache.clear();
        self.boolean_cache.clear();
        self.fuzzy_cache.clear();
        self.plan_cache.clear();
        self.ast_cache.clear();
    }

    pub fn traces(&self) -> Vec<QueryTrace> {
        self.trace.snapshot()
    }

    // ------------------------------------------------------------------
    // Layer execution internals
    // ------------------------------------------------------------------

    fn layer_limit(&self) -> usize {
        self.config.pagination.max_limit
    }

    fn run_terminated(
        &self,
        manager: &EarlyTerminationManager,
        query: &str,
        analysis: &QueryAnalysis,
        token: &CancellationToken,
    ) -> Result<crate::control::termination::TerminationOutcome> {
        let symbolic = ServiceLayer {
            service: self,
            kind: LayerKind::Symbolic,
        };
        let lexical = ServiceLayer {
            service: self,
            kind: LayerKind::Lexical,
        };
        let semantic = ServiceLayer {
            service: self,
            kind: LayerKind::Semantic,
        };
        let layers: [&dyn SearchLayer; 3] = [&symbolic, &lexical, &semantic];
        let resolver = self.meta_resolver();
        manager.execute(
            query,
            self.layer_limit(),
            &layers,
            &analysis.required_info_types,
            &resolver,
            token,
        )
    }

    fn meta_resolver(&self) -> impl Fn(&str) -> Option<(String, String)> + '_ {
        |name: &str| {
            let graph = self.graph.read();
            graph
                .get_by_name(name)
                .map(|e| (e.entity_type.clone(), e.combined_text().to_lowercase()))
        }
    }

    /// Run all three layers, dropping (with a warning) any that fail
    fn collect_layers(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<Vec<LayerScores>> {
        let mut layers = Vec::with_capacity(3);
        for kind in [LayerKind::Symbolic, LayerKind::Lexical, LayerKind::Semantic] {
            token.check()?;
            let scores = match kind {
                LayerKind::Symbolic => self.symbolic_scores(query, limit, token),
                LayerKind::Lexical => self.lexical_scores(query, limit, token),
                LayerKind::Semantic => self.semantic_scores(query, limit, token),
            };
            match scores {
                Ok(scores) => layers.push(LayerScores::new(kind, scores)),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => warn!(layer = %kind, error = %err, "layer dropped from fusion"),
            }
        }
        Ok(layers)
    }

    /// Exact-token layer: observation-word index lookups plus name and tag
    /// token hits; score is the number of matched tokens
    fn symbolic_scores(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<HashMap<String, f32>> {
        let graph = self.graph.read();
        // stop words carry no symbolic signal; keep only content tokens
        let terms = self.tokenizer.tokenize(query);
        let mut scores: HashMap<String, f32> = HashMap::new();

        for term in &terms {
            token.check()?;
            if let Some(names) = graph.entities_by_observation_word(term) {
                for name in names {
                    *scores.entry(name.clone()).or_insert(0.0) += 1.0;
                }
            }
        }
        for name in graph.names_in_order() {
            let Some(lower) = graph.get_lowercased(name) else {
                continue;
            };
            let hits = terms
                .iter()
                .filter(|term| {
                    lower.name.contains(term.as_str())
                        || lower.tags.iter().any(|t| t == *term)
                })
                .count();
            if hits > 0 {
                *scores.entry(name.clone()).or_insert(0.0) += hits as f32;
            }
        }
        Ok(top_scores(scores, limit))
    }

    fn lexical_scores(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<HashMap<String, f32>> {
        token.check()?;
        let scorer = Bm25Scorer {
            k1: self.config.bm25.k1,
            b: self.config.bm25.b,
        };
        let scores = self.inverted.read().score_all(query, &scorer);
        Ok(top_scores(scores, limit))
    }

    fn semantic_scores(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<HashMap<String, f32>> {
        token.check()?;
        let Some(embedder) = self.embedder.as_deref().filter(|e| e.is_available()) else {
            return Ok(HashMap::new());
        };
        let query_vector = embedder.embed(query)?;
        let scored = self.vectors.read().search(&query_vector, limit)?;
        Ok(scored.into_iter().collect())
    }

    fn fused_to_results(
        &self,
        fused: &[HybridHit],
        filter: &SearchFilter,
        page: Page,
        started: Instant,
    ) -> SearchResults {
        let graph = self.graph.read();
        let hits: Vec<SearchHit> = fused
            .iter()
            // entity removed between retrieval and fusion drops out silently
            .filter_map(|hit| {
                graph.get_by_name(&hit.name).map(|entity| SearchHit {
                    entity: entity.clone(),
                    score: hit.combined,
                })
            })
            .collect();
        assemble(hits, filter, page, &graph, started)
    }

    fn run_cached<F>(
        &self,
        cache: &SearchCache,
        kind: &str,
        query: &str,
        filter: &SearchFilter,
        page: Page,
        run: F,
    ) -> Result<SearchResults>
    where
        F: FnOnce(Page) -> Result<SearchResults>,
    {
        filter.validate()?;
        let page = page.clamped(&self.config.pagination);
        let generation = self.graph.read().generation();
        let key = SearchCache::key(kind, query, filter, page, generation);
        let started_at = Utc::now();
        let started = Instant::now();

        if let Some(results) = cache.get(&key) {
            self.trace.record(trace_record(
                query,
                kind,
                started_at,
                started.elapsed().as_millis() as u64,
                results.hits.len(),
                true,
                vec![],
            ));
            return Ok(results);
        }

        let results = run(page)?;
        // caches are only updated on the success path
        cache.put(key, results.clone());
        self.trace.record(trace_record(
            query,
            kind,
            started_at,
            started.elapsed().as_millis() as u64,
            results.hits.len(),
            false,
            vec![],
        ));
        Ok(results)
    }
}

/// Layer adapter dispatching into the service internals
struct ServiceLayer<'a> {
    service: &'a SearchService,
    kind: LayerKind,
}

impl SearchLayer for ServiceLayer<'_> {
    fn kind(&self) -> LayerKind {
        self.kind
    }

    fn run(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<HashMap<String, f32>> {
        match self.kind {
            LayerKind::Symbolic => self.service.symbolic_scores(query, limit, token),
            LayerKind::Lexical => self.service.lexical_scores(query, limit, token),
            LayerKind::Semantic => self.service.semantic_scores(query, limit, token),
        }
    }
}

/// Keep the `limit` best entries, ranked score desc with name tiebreak
fn top_scores(scores: HashMap<String, f32>, limit: usize) -> HashMap<String, f32> {
    if scores.len() <= limit {
        return scores;
    }
    let mut ranked: Vec<(String, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(limit);
    ranked.into_iter().collect()
}
