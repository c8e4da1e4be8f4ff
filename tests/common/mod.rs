#![allow(dead_code)]

use std::thread;

use dualtree_dist::{
    local_cluster, DistributedTable, LocalTransport, PointSet, Statistic, Table, TreeBuilder,
};

/// Split `total` points as evenly as possible over `ranks`.
pub fn partition_sizes(total: usize, ranks: usize) -> Vec<usize> {
    let base = total / ranks;
    let extra = total % ranks;
    (0..ranks).map(|rank| base + usize::from(rank < extra)).collect()
}

/// Distinct, well-spread points; row `i` is the same on every call.
pub fn global_rows(total: usize, dims: usize) -> Vec<Vec<f64>> {
    (0..total)
        .map(|i| {
            (0..dims)
                .map(|d| ((i * (7 + 2 * d) + d * 13) % 101) as f64 + i as f64 * 1e-3)
                .collect()
        })
        .collect()
}

/// Rows belonging to partition `rank`.
pub fn partition_rows(rows: &[Vec<f64>], sizes: &[usize], rank: usize) -> Vec<Vec<f64>> {
    let begin: usize = sizes[..rank].iter().sum();
    rows[begin..begin + sizes[rank]].to_vec()
}

/// Distributed table over partition `rank` of `rows`.
pub fn distributed_table<S: Statistic>(
    rows: &[Vec<f64>],
    sizes: &[usize],
    rank: usize,
    leaf_size: usize,
) -> DistributedTable<S> {
    let local = partition_rows(rows, sizes, rank);
    let dims = rows.first().map_or(1, Vec::len);
    let points = if local.is_empty() {
        PointSet::new(dims, Vec::new()).expect("empty point set")
    } else {
        PointSet::from_rows(&local).expect("rows are rectangular")
    };
    let builder = TreeBuilder::new(leaf_size).expect("leaf size is positive");
    DistributedTable::new(rank, sizes, Table::build(points, &builder)).expect("partition matches")
}

/// Run `body` once per rank of a fresh in-process group, one thread each.
///
/// Results come back in rank order.
pub fn run_cluster<R, F>(size: usize, verify_checksums: bool, body: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalTransport) -> R + Sync,
{
    let world = local_cluster(size, verify_checksums);
    thread::scope(|scope| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|transport| {
                let body = &body;
                scope.spawn(move || body(transport))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("rank thread panicked"))
            .collect()
    })
}

/// Smallest distance from `point` to any row other than itself.
pub fn brute_force_nearest(point: &[f64], rows: &[Vec<f64>]) -> f64 {
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(point)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt()
        })
        .filter(|&distance| distance > 0.0)
        .fold(f64::INFINITY, f64::min)
}
