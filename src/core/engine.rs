use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::core::cancel::CancellationToken;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::graph::commands::GraphCommands;
use crate::graph::index::GraphIndex;
use crate::ports::{Embedder, GraphStore};
use crate::search::filter::{Page, SearchFilter};
use crate::search::results::SearchResults;
use crate::search::service::{SearchService, ServiceCacheStats};

/// Engine runtime statistics
#[derive(Debug, Serialize)]
pub struct EngineStats {
    pub uptime_secs: u64,
    pub entity_count: usize,
    pub relation_count: usize,
    pub generation: u64,
    pub query_count: u64,
    pub caches: ServiceCacheStats,
}

/// Top-level assembly of the knowledge-graph search core
///
/// Loads the snapshot from the store port, builds the graph and derived
/// indexes, and exposes the command and search surfaces.
pub struct Engine {
    config: Config,
    graph: Arc<RwLock<GraphIndex>>,
    commands: GraphCommands,
    search: Arc<SearchService>,
    start_time: Instant,
    query_count: AtomicU64,
}

impl Engine {
    /// Build an engine over the given ports; the store snapshot is loaded
    /// and indexed before the engine is returned
    pub fn new(
        config: Config,
        store: Arc<dyn GraphStore>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self> {
        Self::with_cancellation(config, store, embedder, &CancellationToken::never())
    }

    pub fn with_cancellation(
        config: Config,
        store: Arc<dyn GraphStore>,
        embedder: Option<Arc<dyn Embedder>>,
        token: &CancellationToken,
    ) -> Result<Self> {
        let graph = Arc::new(RwLock::new(GraphIndex::new(config.limits)));
        let search = SearchService::new(config.clone(), graph.clone(), embedder);

        let snapshot = store.load_snapshot()?;
        let loaded = {
            let mut guard = graph.write();
            guard.load(snapshot.entities, snapshot.relations, token)?
        };
        // listeners populated the lexical index during load; embeddings
        // need the explicit pipeline
        if loaded > 0 {
            search.index_all(token)?;
        }
        info!(entities = loaded, "engine loaded from snapshot");

        Ok(Engine {
            commands: GraphCommands::new(graph.clone(), store),
            config,
            graph,
            search,
            start_time: Instant::now(),
            query_count: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Entity and relation mutation surface
    pub fn commands(&self) -> &GraphCommands {
        &self.commands
    }

    /// Search surface
    pub fn search(&self) -> &SearchService {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        &self.search
    }

    pub fn graph(&self) -> Arc<RwLock<GraphIndex>> {
        self.graph.clone()
    }

    /// Convenience pass-through for the most common call
    pub fn basic_search(&self, query: &str) -> Result<SearchResults> {
        let page = Page::default_for(&self.config.pagination);
        self.search().basic(query, &SearchFilter::default(), page)
    }

    pub fn stats(&self) -> EngineStats {
        let (entity_count, relation_count, generation) = {
            let graph = self.graph.read();
            (graph.len(), graph.relations().len(), graph.generation())
        };
        EngineStats {
            uptime_secs: self.start_time.elapsed().as_secs(),
            entity_count,
            relation_count,
            generation,
            query_count: self.query_count.load(Ordering::Relaxed),
            caches: self.search.cache_stats(),
        }
    }
}
