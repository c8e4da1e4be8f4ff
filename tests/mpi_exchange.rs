//! Runs under `cargo test --features mpi`, or across processes with
//! `mpirun -n 4 target/debug/deps/mpi_exchange-*`. MPI may only be
//! initialised once per process, so everything lives in one test.

mod common;

use dualtree_dist::{
    BruteForceNearest, CountStatistic, DistanceResults, DistributedDualtreeDfs, EuclideanMetric,
    GnpError, GnpProblem, HeapArena, HypercubeExchanger, MpiTransport, PendingWork, Problem,
    Table, TransportChannel,
};

use common::{brute_force_nearest, distributed_table, global_rows, partition_sizes};

#[test]
fn exchange_and_search_over_mpi_world() {
    let universe = mpi::initialize().expect("MPI initialises once");
    let transport = MpiTransport::new(universe.world(), true);
    let (rank, size) = (transport.rank(), transport.size());

    let rows = global_rows(12 * size + 5, 3);
    let sizes = partition_sizes(rows.len(), size);
    let arena = HeapArena::unbounded();

    if !size.is_power_of_two() {
        let local = distributed_table::<CountStatistic>(&rows, &sizes, rank, 4);
        let result = HypercubeExchanger::new(&transport, &arena).all_reduce(local.local_table());
        assert!(matches!(
            result.map(|tables| tables.populated()),
            Err(GnpError::UnsupportedTopology { .. })
        ));
        return;
    }

    let originals: Vec<Table<CountStatistic>> = (0..size)
        .map(|peer| distributed_table(&rows, &sizes, peer, 4).local_table().clone())
        .collect();
    let exchanger = HypercubeExchanger::new(&transport, &arena);
    let tables = exchanger
        .all_reduce(&originals[rank])
        .expect("exchange succeeds");
    assert!(tables.is_complete());
    for (peer, original) in originals.iter().enumerate() {
        assert_eq!(tables.get(peer), Some(original), "slot {} differs", peer);
    }
    assert_eq!(exchanger.release(tables), size - 1);

    let mut problem: GnpProblem<CountStatistic, DistanceResults> =
        GnpProblem::monochromatic(distributed_table(&rows, &sizes, rank, 4));
    let mut results = DistanceResults::default();
    let mut hook = BruteForceNearest::new(&sizes).excluding_self();
    let outcome = DistributedDualtreeDfs::init(&transport, &arena, &mut problem)
        .expect("init succeeds")
        .compute_with(&EuclideanMetric, &mut results, &mut hook)
        .expect("compute succeeds");
    assert_eq!(outcome.pending, PendingWork::None);
    assert_eq!(outcome.rounds, size.trailing_zeros());

    let local_points = problem.query_table().local_table().points();
    for q in 0..local_points.len() {
        let expected = brute_force_nearest(local_points.point(q), &rows);
        assert!((results.min_distances[q] - expected).abs() < 1e-12);
    }
    assert!(arena.stats().is_balanced());
}
