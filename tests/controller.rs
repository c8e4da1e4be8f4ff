mod common;

use test_case::test_case;

use dualtree_dist::exchange::RecordingObserver;
use dualtree_dist::statistic::preprocess_reference_tree;
use dualtree_dist::{
    BoundStatistic, BruteForceNearest, CountStatistic, DistanceResults, DistributedDualtreeDfs,
    EuclideanMetric, GnpError, GnpProblem, HeapArena, PendingWork, Problem, TransportChannel,
};

use common::{brute_force_nearest, distributed_table, global_rows, partition_sizes, run_cluster};

#[test_case(1; "one rank")]
#[test_case(2; "two ranks")]
#[test_case(4; "four ranks")]
fn monochromatic_nearest_neighbours_match_brute_force(size: usize) {
    let rows = global_rows(37, 3);
    let sizes = partition_sizes(rows.len(), size);
    let arena = HeapArena::unbounded();

    run_cluster(size, true, |transport| {
        let rank = transport.rank();
        let table = distributed_table::<BoundStatistic>(&rows, &sizes, rank, 4);
        let mut problem: GnpProblem<BoundStatistic, DistanceResults> =
            GnpProblem::monochromatic(table);
        let mut results = DistanceResults::default();
        let mut hook = BruteForceNearest::new(&sizes).excluding_self();

        let mut dfs =
            DistributedDualtreeDfs::init(&transport, &arena, &mut problem).expect("init succeeds");
        let outcome = dfs
            .compute_with(&EuclideanMetric, &mut results, &mut hook)
            .expect("compute succeeds");

        assert_eq!(outcome.pending, PendingWork::None);
        assert_eq!(outcome.pairs_visited, size);
        assert_eq!(outcome.tables_materialized, size - 1);
        assert_eq!(outcome.tables_released, size - 1);
        assert_eq!(results.len(), sizes[rank]);

        let local_points = dfs.query_table().local_table().points();
        for q in 0..local_points.len() {
            let expected = brute_force_nearest(local_points.point(q), &rows);
            assert!(
                (results.min_distances[q] - expected).abs() < 1e-12,
                "rank {} query {}: got {}, expected {}",
                rank,
                q,
                results.min_distances[q],
                expected
            );
            assert!(results.neighbors[q].is_some());
        }
    });

    assert!(arena.stats().is_balanced());
}

#[test]
fn bichromatic_search_uses_the_reference_partitions() {
    let query_rows = global_rows(20, 2);
    let reference_rows: Vec<Vec<f64>> = global_rows(29, 2)
        .into_iter()
        .map(|row| row.into_iter().map(|x| x + 0.25).collect())
        .collect();
    let query_sizes = partition_sizes(query_rows.len(), 2);
    let reference_sizes = partition_sizes(reference_rows.len(), 2);
    let arena = HeapArena::unbounded();

    run_cluster(2, true, |transport| {
        let rank = transport.rank();
        let query = distributed_table::<CountStatistic>(&query_rows, &query_sizes, rank, 3);
        let reference =
            distributed_table::<CountStatistic>(&reference_rows, &reference_sizes, rank, 3);
        let mut problem: GnpProblem<CountStatistic, DistanceResults> =
            GnpProblem::bichromatic(query, reference);
        assert!(!problem.is_monochromatic());

        let mut results = DistanceResults::default();
        let mut hook = BruteForceNearest::new(&reference_sizes);
        let mut dfs =
            DistributedDualtreeDfs::init(&transport, &arena, &mut problem).expect("init succeeds");
        dfs.compute_with(&EuclideanMetric, &mut results, &mut hook)
            .expect("compute succeeds");

        assert_eq!(
            dfs.reference_table().local_table().tree().stat().count,
            reference_sizes[rank]
        );
        assert_eq!(dfs.query_table().local_table().tree().stat().count, 0);

        let local_points = dfs.query_table().local_table().points();
        for q in 0..local_points.len() {
            let expected = brute_force_nearest(local_points.point(q), &reference_rows);
            assert!((results.min_distances[q] - expected).abs() < 1e-12);
            let neighbor = results.neighbors[q].expect("a reference point was seen");
            assert!(neighbor < reference_rows.len());
        }
    });
}

#[test]
fn compute_without_hook_leaves_traversal_pending() {
    let rows = global_rows(24, 2);
    let sizes = partition_sizes(rows.len(), 4);
    let arena = HeapArena::unbounded();

    let outcomes = run_cluster(4, false, |transport| {
        let rank = transport.rank();
        let table = distributed_table::<CountStatistic>(&rows, &sizes, rank, 2);
        let mut problem: GnpProblem<CountStatistic, DistanceResults> =
            GnpProblem::monochromatic(table);
        let mut results = DistanceResults::default();
        let observer = RecordingObserver::new();

        let outcome = DistributedDualtreeDfs::init(&transport, &arena, &mut problem)
            .expect("init succeeds")
            .with_observer(&observer)
            .compute(&EuclideanMetric, &mut results)
            .expect("compute succeeds");

        assert_eq!(results.len(), sizes[rank]);
        assert!(results.min_distances.iter().all(|d| d.is_infinite()));
        assert!(results.neighbors.iter().all(Option::is_none));
        assert_eq!(observer.rounds_completed(), 2);
        outcome
    });

    for outcome in outcomes {
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.tables_materialized, 3);
        assert_eq!(outcome.tables_released, 3);
        assert_eq!(outcome.pairs_visited, 0);
        assert_eq!(outcome.pending, PendingWork::SerialTraversal);
    }
    assert!(arena.stats().is_balanced());
}

#[test]
fn init_zeroes_previous_statistics() {
    let rows = global_rows(10, 2);
    let sizes = partition_sizes(rows.len(), 1);
    let mut query = distributed_table::<CountStatistic>(&rows, &sizes, 0, 2);
    let mut reference = query.clone();
    for table in [&mut query, &mut reference] {
        let (points, tree) = table.split_global_mut();
        preprocess_reference_tree(tree, &points).expect("reference pass");
        assert_eq!(table.tree().stat().count, 10);
    }

    let problem: GnpProblem<CountStatistic, DistanceResults> =
        GnpProblem::bichromatic(query, reference);
    run_cluster(1, true, |transport| {
        let arena = HeapArena::unbounded();
        let mut problem = problem.clone();
        let dfs = DistributedDualtreeDfs::init(&transport, &arena, &mut problem)
            .expect("init succeeds");
        assert!(dfs
            .query_table()
            .tree()
            .iter_pre_order()
            .all(|(node, _)| node.stat().count == 0));
        assert!(dfs
            .reference_table()
            .tree()
            .iter_pre_order()
            .all(|(node, _)| node.stat().count == 0));
    });
    assert_eq!(problem.query_table().tree().stat().count, 10);
}

#[test]
fn controller_rejects_non_power_of_two_groups() {
    let rows = global_rows(9, 2);
    let sizes = partition_sizes(rows.len(), 3);
    let arena = HeapArena::unbounded();

    let outcomes = run_cluster(3, true, |transport| {
        let table = distributed_table::<CountStatistic>(&rows, &sizes, transport.rank(), 2);
        let mut problem: GnpProblem<CountStatistic, DistanceResults> =
            GnpProblem::monochromatic(table);
        let mut results = DistanceResults::default();
        DistributedDualtreeDfs::init(&transport, &arena, &mut problem)
            .expect("init does not communicate")
            .compute(&EuclideanMetric, &mut results)
    });

    for outcome in outcomes {
        assert!(matches!(outcome, Err(GnpError::UnsupportedTopology { size: 3 })));
    }
    assert_eq!(arena.stats().constructed, 0);
}
