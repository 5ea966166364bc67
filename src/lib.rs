pub mod analysis;
pub mod control;
pub mod core;
pub mod graph;
pub mod index;
pub mod ports;
pub mod query;
pub mod scoring;
pub mod search;

pub use crate::core::cancel::CancellationToken;
pub use crate::core::config::Config;
pub use crate::core::engine::{Engine, EngineStats};
pub use crate::core::error::{Error, Result};
pub use crate::core::types::{Entity, EntityPatch, Relation};
pub use crate::ports::{Embedder, GraphStore, WorkerPool};
pub use crate::search::filter::{Page, SearchFilter};
pub use crate::search::results::{SearchHit, SearchResults};
pub use crate::search::service::SearchService;

/*
┌─────────────────────────────────────────────────────────────────────────────┐
│                          MNEMORA STRUCT ARCHITECTURE                        │
└─────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── CORE LAYER ─────────────────────────────────┐
│                                                                             │
│  ┌───────────────────────────────────────────────────────────────────────┐ │
│  │                            struct Engine                              │ │
│  │  ┌─────────────────────────────────────────────────────────────────┐ │ │
│  │  │ config: Config                    // engine configuration       │ │ │
│  │  │ graph: Arc<RwLock<GraphIndex>>    // canonical entity registry  │ │ │
│  │  │ commands: GraphCommands           // mutation surface + journal │ │ │
│  │  │ search: Arc<SearchService>        // search surface             │ │ │
│  │  │ start_time: Instant / query_count: AtomicU64                    │ │ │
│  │  └─────────────────────────────────────────────────────────────────┘ │ │
│  └───────────────────────────────────────────────────────────────────────┘ │
│                                                                             │
│  Ports consumed: GraphStore (snapshot + journal), Embedder (vectors),       │
│  WorkerPool (fuzzy compute fan-out)                                         │
└─────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── GRAPH LAYER ────────────────────────────────┐
│                                                                             │
│  GraphIndex ──owns──> entities / relations / observation-word index         │
│      │                lowercase cache (lazy) / generation counter           │
│      └──publishes──> ChangeEvent ──to──> ListenerRegistry                   │
│                          │                                                  │
│                          ├──> IndexMaintainer (inverted index, vectors)     │
│                          └──> CacheInvalidator (result + AST caches)        │
└─────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── SEARCH LAYER ────────────────────────────────┐
│                                                                             │
│  BasicSearch / RankedSearch(TfIdf|Bm25) / BooleanSearch / FuzzySearch /     │
│  SemanticSearch ──assemble──> SearchResults (+ subgraph projection)         │
│                                                                             │
│  HybridScorer ──fuses──> symbolic + lexical + semantic LayerScores          │
│  EarlyTerminationManager ──orders layers, gates on adequacy                 │
│  ReflectionManager ──widens limits, refines queries toward gaps             │
│  QueryAnalyzer ──> QueryPlanner ──> QueryPlanCache (normalized LRU+TTL)     │
└─────────────────────────────────────────────────────────────────────────────┘
*/
