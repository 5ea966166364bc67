use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use mnemora::control::termination::{EarlyTerminationManager, SearchLayer};
use mnemora::core::config::{
    Config, EntityLimits, FuzzyConfig, HybridConfig, TerminationConfig,
};
use mnemora::core::engine::Engine;
use mnemora::graph::index::GraphIndex;
use mnemora::ports::{GraphSnapshot, HashingEmbedder, MemoryGraphStore, SerialWorkerPool};
use mnemora::query::matcher::evaluate_pure;
use mnemora::search::fuzzy::FuzzySearch;
use mnemora::search::hybrid::{HybridScorer, LayerKind, LayerScores};
use mnemora::search::service::SearchService;
use mnemora::{CancellationToken, Entity, Error, Page, Relation, Result, SearchFilter};

fn engine_with(entities: Vec<Entity>, relations: Vec<Relation>) -> Engine {
    let store = Arc::new(MemoryGraphStore::with_snapshot(GraphSnapshot {
        entities,
        relations,
    }));
    Engine::new(
        Config::default(),
        store,
        Some(Arc::new(HashingEmbedder::new(64))),
    )
    .expect("engine builds")
}

fn note(name: &str, obs: &str) -> Entity {
    Entity::new(name, "note").with_observations([obs])
}

// ---------------------------------------------------------------------------
// S1 — TF-IDF ranking over a small corpus
// ---------------------------------------------------------------------------

#[test]
fn s1_ranked_budget_travel_ordering() {
    let engine = engine_with(
        vec![
            note("A", "budget travel hotel"),
            note("B", "budget travel"),
            note("C", "enterprise budget"),
        ],
        vec![],
    );

    let results = engine
        .search()
        .ranked("budget travel", &SearchFilter::default(), Page::new(0, 3))
        .unwrap();

    assert_eq!(results.names(), vec!["A", "B", "C"]);
    // A and B share identical matched-term statistics; C trails but scores
    assert!(results.hits[0].score >= results.hits[1].score);
    assert!(results.hits[1].score > results.hits[2].score);
    assert!(results.hits[2].score > 0.0);
}

// ---------------------------------------------------------------------------
// S2 — boolean mixed operators
// ---------------------------------------------------------------------------

#[test]
fn s2_boolean_mixed_operators() {
    let engine = engine_with(
        vec![
            Entity::new("Alice", "person").with_tags(["python"]),
            Entity::new("Bob", "person").with_tags(["design"]),
            Entity::new("Acme", "company"),
        ],
        vec![],
    );
    let filter = SearchFilter::default();

    let both = engine
        .search()
        .boolean(
            "type:person AND (tag:python OR tag:design)",
            &filter,
            Page::new(0, 10),
        )
        .unwrap();
    assert_eq!(both.names(), vec!["Alice", "Bob"]);

    let excluded = engine
        .search()
        .boolean("type:person NOT tag:python", &filter, Page::new(0, 10))
        .unwrap();
    assert_eq!(excluded.names(), vec!["Bob"]);
}

// ---------------------------------------------------------------------------
// S3 — fuzzy typo lookup
// ---------------------------------------------------------------------------

#[test]
fn s3_fuzzy_typo_matches_only_alice() {
    let engine = engine_with(
        vec![
            Entity::new("Alice", "person"),
            Entity::new("Alicia", "person"),
            Entity::new("Bob", "person"),
        ],
        vec![],
    );

    let results = engine
        .search()
        .fuzzy("Alise", &SearchFilter::default(), Page::new(0, 10))
        .unwrap();

    // lev(alise, alice) = 1 over 5 chars -> 0.8 passes the 0.7 threshold;
    // alicia lands at 0.5 and bob nowhere near
    assert_eq!(results.names(), vec!["Alice"]);
}

#[test]
fn s3_name_matches_outrank_observation_matches() {
    let mut graph = GraphIndex::new(EntityLimits::default());
    graph
        .create_entity(Entity::new("Journal", "note").with_observations(["met alise today"]))
        .unwrap();
    graph.create_entity(Entity::new("Alise", "person")).unwrap();

    let pool = SerialWorkerPool;
    let search = FuzzySearch::new(
        &graph,
        FuzzyConfig {
            threshold: 0.7,
            use_worker_pool: false,
        },
        &pool,
    );
    let results = search.search("Alise", &SearchFilter::default(), Page::new(0, 10));

    // both hit similarity 1.0; the name match must rank first
    assert_eq!(results.names(), vec!["Alise", "Journal"]);
}

// ---------------------------------------------------------------------------
// S4 — hybrid fusion
// ---------------------------------------------------------------------------

#[test]
fn s4_hybrid_fusion_order_and_cutoff() {
    let scorer = HybridScorer::new(HybridConfig {
        min_score: 0.01,
        ..Default::default()
    });
    let to_layer = |kind, scores: &[(&str, f32)]| {
        LayerScores::new(
            kind,
            scores
                .iter()
                .map(|(n, s)| (n.to_string(), *s))
                .collect::<HashMap<_, _>>(),
        )
    };

    let hits = scorer.fuse(&[
        to_layer(LayerKind::Semantic, &[("A", 0.9), ("B", 0.5)]),
        to_layer(LayerKind::Lexical, &[("A", 5.0), ("C", 1.0)]),
        to_layer(LayerKind::Symbolic, &[("C", 0.8)]),
    ]);

    let order: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(order, vec!["A", "C"]);
    assert!((hits[0].combined - 0.8).abs() < 1e-6);
    // B normalises to zero in its only layer and falls under min_score
    assert!(hits.iter().all(|h| h.name != "B"));
}

// ---------------------------------------------------------------------------
// S5 — early termination after an adequate symbolic layer
// ---------------------------------------------------------------------------

struct StaticLayer {
    kind: LayerKind,
    scores: Vec<(&'static str, f32)>,
    hit_counter: Arc<RwLock<Vec<LayerKind>>>,
}

impl SearchLayer for StaticLayer {
    fn kind(&self) -> LayerKind {
        self.kind
    }

    fn run(
        &self,
        _query: &str,
        _limit: usize,
        _token: &CancellationToken,
    ) -> Result<HashMap<String, f32>> {
        self.hit_counter.write().push(self.kind);
        Ok(self
            .scores
            .iter()
            .map(|(n, s)| (n.to_string(), *s))
            .collect())
    }
}

#[test]
fn s5_symbolic_layer_alone_terminates() {
    let executed = Arc::new(RwLock::new(Vec::new()));
    let layer = |kind, scores: Vec<(&'static str, f32)>| StaticLayer {
        kind,
        scores,
        hit_counter: executed.clone(),
    };

    let symbolic = layer(
        LayerKind::Symbolic,
        vec![("a", 0.9), ("b", 0.85), ("c", 0.85), ("d", 0.8)],
    );
    let lexical = layer(LayerKind::Lexical, vec![("x", 1.0)]);
    let semantic = layer(LayerKind::Semantic, vec![("y", 1.0)]);

    let manager = EarlyTerminationManager::new(
        TerminationConfig {
            adequacy_threshold: 0.5,
            min_results: 3,
            min_relevance: 0.5,
            min_diversity: 0.0,
            layer_timeout_ms: Some(1000),
        },
        HybridConfig::default(),
    );

    let layers: [&dyn SearchLayer; 3] = [&symbolic, &lexical, &semantic];
    let outcome = manager
        .execute(
            "q",
            10,
            &layers,
            &[],
            &|name| Some(("note".to_string(), format!("about {name}"))),
            &CancellationToken::never(),
        )
        .unwrap();

    assert_eq!(outcome.executed_layers, vec![LayerKind::Symbolic]);
    assert!(outcome.early_terminated);
    assert_eq!(*executed.read(), vec![LayerKind::Symbolic]);
}

// ---------------------------------------------------------------------------
// S6 — reflection widening (see control::reflection unit tests for the
// keyword assertions; this exercises the limits end to end)
// ---------------------------------------------------------------------------

#[test]
fn s6_reflection_limits_widen_and_bound() {
    use mnemora::control::reflection::ReflectionManager;
    use mnemora::core::config::ReflectionConfig;
    use mnemora::query::analyzer::InfoType;

    let requested = RwLock::new(Vec::new());
    let executor = |_q: &str,
                    limit: usize,
                    _t: &CancellationToken|
     -> mnemora::Result<Vec<mnemora::search::hybrid::HybridHit>> {
        requested.write().push(limit);
        Ok(Vec::new())
    };

    let manager = ReflectionManager::new(
        ReflectionConfig {
            max_iterations: 3,
            initial_limit: 10,
            limit_increase_factor: 2.0,
            focus_missing_types: true,
        },
        TerminationConfig::default(),
    );
    let outcome = manager
        .execute(
            "Who is Alice?",
            &[InfoType::Person],
            &executor,
            &|_n| Some(("document".to_string(), String::new())),
            &CancellationToken::never(),
        )
        .unwrap();

    assert_eq!(*requested.read(), vec![10, 20, 40]);
    assert_eq!(outcome.final_limit, 40);
    for pair in outcome.refinement_history.windows(2) {
        assert!(pair[0].limit <= pair[1].limit);
    }
    // refined queries target the missing person info type
    for step in &outcome.refinement_history[1..] {
        let lower = step.query.to_lowercase();
        assert!(["who", "person", "people"].iter().any(|kw| lower.contains(kw)));
    }
}

// ---------------------------------------------------------------------------
// Law 1 — df(t) equals the number of entities whose tokens contain t
// ---------------------------------------------------------------------------

#[test]
fn law_document_frequency_consistency() {
    use mnemora::analysis::tokenizer::Tokenizer;
    use mnemora::index::inverted::InvertedIndex;

    let corpus = [
        ("A", "budget travel hotel"),
        ("B", "budget travel"),
        ("C", "enterprise budget"),
        ("D", "quiet forest cabin"),
    ];
    let tokenizer = Tokenizer::default();
    let mut index = InvertedIndex::new(tokenizer.clone());
    let entities: Vec<Entity> = corpus.iter().map(|(n, o)| note(n, o)).collect();

    // interleave adds and removes and recheck after every step
    let check = |index: &InvertedIndex, live: &[&Entity]| {
        for term in ["budget", "travel", "hotel", "enterprise", "forest", "note"] {
            let expected = live
                .iter()
                .filter(|e| tokenizer.tokenize(&e.combined_text()).contains(&term.to_string()))
                .count();
            assert_eq!(index.doc_freq(term), expected, "df({term}) diverged");
        }
    };

    index.add_entity(&entities[0]);
    index.add_entity(&entities[1]);
    check(&index, &[&entities[0], &entities[1]]);

    index.add_entity(&entities[2]);
    index.remove_entity("A");
    check(&index, &[&entities[1], &entities[2]]);

    index.add_entity(&entities[3]);
    index.remove_entity("B");
    index.remove_entity("C");
    check(&index, &[&entities[3]]);
}

// ---------------------------------------------------------------------------
// Law 2 — single-token queries: basic and ranked agree on token-exact corpora
// ---------------------------------------------------------------------------

#[test]
fn law_basic_subset_of_ranked_for_single_terms() {
    let engine = engine_with(
        vec![
            note("A", "falcon glides over water"),
            note("B", "falcon nests high"),
            note("C", "heron stands still"),
        ],
        vec![],
    );
    let filter = SearchFilter::default();

    for term in ["falcon", "heron", "glides"] {
        let basic: HashSet<String> = engine
            .search()
            .basic(term, &filter, Page::new(0, 50))
            .unwrap()
            .names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let ranked: HashSet<String> = engine
            .search()
            .ranked(term, &filter, Page::new(0, 50))
            .unwrap()
            .names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(
            basic.is_subset(&ranked),
            "ranked({term}) must cover basic({term})"
        );
    }
}

// ---------------------------------------------------------------------------
// Law 7 — any create/delete forces a result-cache miss
// ---------------------------------------------------------------------------

#[test]
fn law_cache_invalidation_on_population_change() {
    let engine = engine_with(vec![note("A", "alpha")], vec![]);
    let filter = SearchFilter::default();

    engine.search().basic("alpha", &filter, Page::new(0, 10)).unwrap();
    engine.search().basic("alpha", &filter, Page::new(0, 10)).unwrap();
    let hits_before = engine.search().cache_stats().basic.hits;
    assert_eq!(hits_before, 1);

    engine.commands().create_entity(note("B", "beta")).unwrap();
    engine.commands().delete_entity("B").unwrap();

    engine.search().basic("alpha", &filter, Page::new(0, 10)).unwrap();
    assert_eq!(engine.search().cache_stats().basic.hits, hits_before);
}

// ---------------------------------------------------------------------------
// Law 8 — cycle guard over parent chains
// ---------------------------------------------------------------------------

#[test]
fn law_cycle_guard() {
    let engine = engine_with(
        vec![
            Entity::new("root", "node"),
            Entity::new("mid", "node"),
            Entity::new("leaf", "node"),
        ],
        vec![],
    );
    let commands = engine.commands();

    commands.set_parent("mid", Some("root".into())).unwrap();
    commands.set_parent("leaf", Some("mid".into())).unwrap();

    assert!(matches!(
        commands.set_parent("root", Some("leaf".into())),
        Err(Error::Cycle(_))
    ));
    assert!(matches!(
        commands.set_parent("root", Some("root".into())),
        Err(Error::Cycle(_))
    ));
    // legal reparenting still works
    commands.set_parent("leaf", Some("root".into())).unwrap();
}

// ---------------------------------------------------------------------------
// Law 9 — pagination concatenation under a stable ordering
// ---------------------------------------------------------------------------

#[test]
fn law_pagination_concatenation() {
    let entities: Vec<Entity> = (0..9)
        .map(|i| note(&format!("doc-{i}"), "shared marker text"))
        .collect();
    let engine = engine_with(entities, vec![]);
    let filter = SearchFilter::default();

    let whole = engine
        .search()
        .ranked("marker", &filter, Page::new(0, 6))
        .unwrap();
    let first = engine
        .search()
        .ranked("marker", &filter, Page::new(0, 3))
        .unwrap();
    let second = engine
        .search()
        .ranked("marker", &filter, Page::new(3, 3))
        .unwrap();

    let mut joined = first.names();
    joined.extend(second.names());
    assert_eq!(joined, whole.names());
}

// ---------------------------------------------------------------------------
// Subgraph projection and relation cascade through the full stack
// ---------------------------------------------------------------------------

#[test]
fn projection_tracks_entity_deletion() {
    let engine = engine_with(
        vec![
            Entity::new("Alice", "person").with_observations(["works on search"]),
            Entity::new("Acme", "company").with_observations(["search company"]),
        ],
        vec![Relation::new("Alice", "Acme", "works_at")],
    );
    let filter = SearchFilter::default();

    let results = engine
        .search()
        .basic("search", &filter, Page::new(0, 10))
        .unwrap();
    assert_eq!(results.hits.len(), 2);
    assert_eq!(results.relations.len(), 1);

    engine.commands().delete_entity("Acme").unwrap();
    let results = engine
        .search()
        .basic("search", &filter, Page::new(0, 10))
        .unwrap();
    assert_eq!(results.names(), vec!["Alice"]);
    assert!(results.relations.is_empty());
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

mod properties {
    use super::*;
    use mnemora::analysis::distance::similarity;
    use mnemora::core::types::LowercasedEntity;
    use mnemora::query::ast::{BooleanNode, QueryField};
    use mnemora::query::plan_cache::normalize_query;
    use proptest::prelude::*;

    fn arb_term() -> impl Strategy<Value = BooleanNode> {
        prop_oneof![
            "[a-c]{1,3}".prop_map(BooleanNode::term),
            "[a-c]{1,3}".prop_map(|v| BooleanNode::field_term(QueryField::Tag, v)),
            "[a-c]{1,3}".prop_map(|v| BooleanNode::field_term(QueryField::Name, v)),
        ]
    }

    fn arb_node() -> impl Strategy<Value = BooleanNode> {
        arb_term().prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..3).prop_map(BooleanNode::And),
                prop::collection::vec(inner.clone(), 1..3).prop_map(BooleanNode::Or),
                inner.prop_map(|n| BooleanNode::Not(Box::new(n))),
            ]
        })
    }

    fn arb_entity() -> impl Strategy<Value = LowercasedEntity> {
        (
            "[a-c]{1,4}",
            "[a-c]{1,4}",
            prop::collection::vec("[a-c]{1,4}", 0..3),
            prop::collection::vec("[a-c]{1,3}", 0..3),
        )
            .prop_map(|(name, entity_type, observations, tags)| LowercasedEntity {
                name,
                entity_type,
                observations,
                tags,
            })
    }

    proptest! {
        // Law 3 — CNF is evaluation-canonical
        #[test]
        fn cnf_preserves_evaluation(node in arb_node(), entity in arb_entity()) {
            let cnf = node.to_cnf();
            prop_assert_eq!(
                evaluate_pure(&node, &entity),
                evaluate_pure(&cnf, &entity)
            );
        }

        // Law 4 — fuzzy similarity is reflexive and symmetric under folding
        #[test]
        fn similarity_reflexive_and_symmetric(a in "[a-zA-Z]{0,12}", b in "[a-zA-Z]{0,12}") {
            let fold_a = a.to_lowercase();
            let fold_b = b.to_lowercase();
            prop_assert!((similarity(&fold_a, &fold_a) - 1.0).abs() < f32::EPSILON);
            prop_assert_eq!(
                similarity(&fold_a, &fold_b).to_bits(),
                similarity(&fold_b, &fold_a).to_bits()
            );
        }

        // Law 6 — query normalization is idempotent
        #[test]
        fn normalization_idempotent(query in "[ a-zA-Z?!.]{0,40}") {
            let once = normalize_query(&query);
            let twice = normalize_query(&once);
            prop_assert_eq!(once, twice);
        }

        // NNF never contains negated composites
        #[test]
        fn nnf_pushes_not_to_leaves(node in arb_node()) {
            fn check(node: &BooleanNode) -> bool {
                match node {
                    BooleanNode::Not(inner) => matches!(inner.as_ref(), BooleanNode::Term { .. }),
                    BooleanNode::And(children) | BooleanNode::Or(children) => {
                        children.iter().all(check)
                    }
                    BooleanNode::Term { .. } => true,
                }
            }
            prop_assert!(check(&node.to_nnf()));
        }
    }

    // Law 5 — single non-degenerate layer: top combined equals the
    // renormalized layer weight
    #[test]
    fn single_layer_top_score_is_effective_weight() {
        let scorer = HybridScorer::new(HybridConfig::default());
        let layer = LayerScores::new(
            LayerKind::Lexical,
            [("a".to_string(), 4.0), ("b".to_string(), 1.0)]
                .into_iter()
                .collect(),
        );
        let hits = scorer.fuse(&[layer]);
        // lexical weight 0.4 renormalizes to 1.0 as the only present layer
        assert!((hits[0].combined - 1.0).abs() < 1e-6);
    }

    // Law 6 — plan cache round trip until eviction
    #[test]
    fn plan_cache_get_after_set() {
        let graph = Arc::new(RwLock::new(GraphIndex::new(EntityLimits::default())));
        let service = SearchService::new(Config::default(), graph, None);
        let first = service.plan("Where is the Denver office?");
        let again = service.plan("where is the denver office");
        assert!(again.cache_hit);
        assert_eq!(first.plan, again.plan);
    }
}
