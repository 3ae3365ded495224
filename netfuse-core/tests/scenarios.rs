//! End-to-end queries through `FusionEngine`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use netfuse_core::data::InMemoryDataset;
use netfuse_core::matrix::SymMatrix;
use netfuse_core::types::{AttributeGroupInfo, NetworkInfo};
use netfuse_core::{
    CombiningMethod, Feature, FusionEngine, NullProgress, OrganismRef, ProgressReporter, Request, Response,
    ScoringMethod, Stage,
};

fn run(engine: &FusionEngine, request: &Request) -> Response {
    engine
        .find_related(request, &NullProgress)
        .unwrap()
        .into_response()
        .expect("query was not cancelled")
}

#[test]
fn test_scaled_identity_kernel_reinforces_query_genes() {
    let org = OrganismRef::core(1);
    let dataset = InMemoryDataset::new()
        .with_nodes(&org, vec![1, 2, 3, 4, 5])
        .with_kernel(
            &org,
            NetworkInfo::new(1, 1, "diagonal").with_default(),
            SymMatrix::scaled_identity(5, 2.0),
        );
    let engine = FusionEngine::new(Arc::new(dataset));

    let request = Request::new(org, vec![2, 4])
        .with_combining_method(CombiningMethod::Average)
        .with_scoring_method(ScoringMethod::Discriminant);
    let response = run(&engine, &request);

    let discriminant = response.discriminant.unwrap();
    assert_eq!(discriminant.len(), 5);
    for unlabeled in [0, 2, 4] {
        assert!(discriminant[1] > discriminant[unlabeled]);
        assert!(discriminant[3] > discriminant[unlabeled]);
    }
    assert!(response.ranked_nodes.iter().all(|n| n.node_id != 2 && n.node_id != 4));
}

#[test]
fn test_small_query_resolves_to_average() {
    let org = OrganismRef::core(1);
    let dataset = InMemoryDataset::new()
        .with_nodes(&org, (1..=10).collect())
        .with_network(
            &org,
            NetworkInfo::new(1, 1, "a").with_default(),
            vec![(1, 2, 1.0), (2, 3, 1.0), (4, 5, 1.0)],
        )
        .with_network(&org, NetworkInfo::new(2, 2, "b").with_default(), vec![(3, 9, 1.0)]);
    let engine = FusionEngine::new(Arc::new(dataset));

    let small = run(&engine, &Request::new(org.clone(), vec![1, 2, 3]));
    assert_eq!(small.resolved_combining_method, CombiningMethod::Average);
    assert_eq!(
        small.feature_weights.get(&Feature::NetworkKernel { network_id: 1, group_id: 1 }),
        Some(0.5)
    );

    let large = run(&engine, &Request::new(org, (1..=6).collect()));
    assert_eq!(large.resolved_combining_method, CombiningMethod::Automatic);
}

#[test]
fn test_attribute_limit_keeps_best_attributes() {
    let org = OrganismRef::core(1);
    // genes 1..4 are the query; attribute 10 covers exactly the query,
    // then each attribute covers it less well
    let assignments = vec![
        (1, 10, 1.0),
        (2, 10, 1.0),
        (3, 10, 1.0),
        (4, 10, 1.0),
        (1, 11, 1.0),
        (2, 11, 1.0),
        (3, 11, 1.0),
        (1, 12, 1.0),
        (2, 12, 1.0),
        (3, 12, 1.0),
        (4, 12, 1.0),
        (5, 12, 1.0),
        (1, 13, 1.0),
        (2, 13, 1.0),
        (5, 14, 1.0),
        (6, 14, 1.0),
    ];
    let dataset = InMemoryDataset::new()
        .with_nodes(&org, (1..=10).collect())
        .with_network(&org, NetworkInfo::new(1, 1, "n").with_default(), vec![(1, 2, 1.0)])
        .with_attribute_group(&org, AttributeGroupInfo::new(3, "domains"), assignments);
    let engine = FusionEngine::new(Arc::new(dataset));

    let request = Request::new(org, vec![1, 2, 3, 4])
        .with_combining_method(CombiningMethod::Average)
        .with_attribute_groups(vec![3], 2);
    let weights = run(&engine, &request).feature_weights;

    let attribute = |attribute_id| Feature::AttributeVector { attribute_id, group_id: 3 };
    let active: Vec<Feature> = weights
        .active()
        .map(|(feature, _)| feature)
        .filter(|feature| matches!(feature, Feature::AttributeVector { .. }))
        .collect();
    assert_eq!(active, vec![attribute(10), attribute(11)]);

    // the rest stay in the map with zero weight
    for id in [12, 13, 14] {
        assert_eq!(weights.get(&attribute(id)), Some(0.0));
    }
}

/// Cancels the query as soon as kernel combination starts.
#[derive(Default)]
struct CancelAt {
    stage: Option<Stage>,
    cancelled: AtomicBool,
}

impl ProgressReporter for CancelAt {
    fn on_stage(&self, stage: Stage) {
        if Some(stage) == self.stage {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[test]
fn test_cancel_before_solve_keeps_cache_valid() {
    let org = OrganismRef::core(1);
    let dataset = InMemoryDataset::new()
        .with_nodes(&org, (1..=6).collect())
        .with_network(
            &org,
            NetworkInfo::new(1, 1, "chain").with_default(),
            vec![(1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0), (4, 5, 1.0), (5, 6, 1.0)],
        );
    let engine = FusionEngine::new(Arc::new(dataset));
    let request = Request::new(org.clone(), vec![1]).with_combining_method(CombiningMethod::Average);

    let progress = CancelAt {
        stage: Some(Stage::CombiningKernels),
        ..Default::default()
    };
    let outcome = engine.find_related(&request, &progress).unwrap();
    assert!(outcome.is_cancelled());
    let loads_after_cancel = engine.cache().stats().loads;
    assert!(loads_after_cancel >= 2);

    let response = run(&engine, &request);
    assert_eq!(engine.cache().stats().loads, loads_after_cancel);
    assert_eq!(response.ranked_nodes[0].node_id, 2);

    let kernel = engine.cache().kernel(&org, 1).unwrap();
    assert_eq!(kernel.dim(), 6);
    assert!(kernel.is_symmetric(0.0));
}

#[test]
fn test_user_networks_fuse_with_core_networks() {
    let core = OrganismRef::core(1);
    let user = OrganismRef::new("user-17", 1);
    let dataset = InMemoryDataset::new()
        .with_nodes(&core, (1..=5).collect())
        .with_network(&core, NetworkInfo::new(1, 1, "curated").with_default(), vec![(1, 2, 1.0)])
        .with_network(&user, NetworkInfo::new(900, 9, "uploaded"), vec![(1, 5, 1.0)]);
    let engine = FusionEngine::new(Arc::new(dataset));

    let request = Request::new(user, vec![1])
        .with_combining_method(CombiningMethod::Average)
        .with_networks(vec![vec![1, 900]]);
    let response = run(&engine, &request);

    let ranked: Vec<i64> = response.ranked_nodes.iter().map(|n| n.node_id).collect();
    assert_eq!(ranked.len(), 2);
    assert!(ranked.contains(&2) && ranked.contains(&5));
}

#[test]
fn test_scoring_methods_rank_the_same_neighbour_first() {
    let org = OrganismRef::core(1);
    let dataset = InMemoryDataset::new()
        .with_nodes(&org, (1..=6).collect())
        .with_network(
            &org,
            NetworkInfo::new(1, 1, "star").with_default(),
            vec![(1, 2, 3.0), (1, 3, 1.0), (4, 5, 1.0)],
        );
    let engine = FusionEngine::new(Arc::new(dataset));

    for method in [ScoringMethod::Discriminant, ScoringMethod::ZScore, ScoringMethod::Context] {
        let request = Request::new(org.clone(), vec![1])
            .with_combining_method(CombiningMethod::Average)
            .with_scoring_method(method);
        let response = run(&engine, &request);
        assert_eq!(response.scoring_method, method);
        assert_eq!(response.ranked_nodes[0].node_id, 2, "{method}");
    }
}
