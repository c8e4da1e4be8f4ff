//! Distributed dual-tree orchestration
//!
//! `init` binds a problem and zeroes its statistics. `compute` sizes the
//! results, preprocesses the global and local trees on both sides, and
//! runs the hypercube all-reduce so that every reference partition is
//! resident. The per-pair serial dual-tree traversal that would consume
//! those tables is not implemented here: callers either supply a
//! [`PairwiseHook`] or get back [`PendingWork::SerialTraversal`].

mod metric;
mod nearest;
mod problem;

pub use metric::{EuclideanMetric, Metric};
pub use nearest::BruteForceNearest;
pub use problem::{DistanceResults, GnpProblem, Problem, QueryResults};

use std::fmt;

use tracing::{info, warn};

use crate::arena::RemoteTableArena;
use crate::exchange::{ExchangeObserver, HypercubeExchanger, NoopObserver};
use crate::statistic::{preprocess_query_tree, preprocess_reference_tree, reset_statistic};
use crate::table::{DistributedTable, Table};
use crate::transport::TransportChannel;
use crate::Result;

/// Work that `compute` leaves for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingWork {
    /// Nothing outstanding.
    None,
    /// No serial traversal ran over the exchanged pairs; results hold
    /// only their initial values.
    SerialTraversal,
}

/// Summary of one `compute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeOutcome {
    /// Exchange rounds executed (`log2(P)`).
    pub rounds: u32,
    /// Reference tables received from peers.
    pub tables_materialized: usize,
    /// Reference tables returned to the arena afterwards.
    pub tables_released: usize,
    /// (local query, reference partition) pairs handed to the hook.
    pub pairs_visited: usize,
    /// Outstanding work.
    pub pending: PendingWork,
}

/// Per-pair computation run while every reference partition is resident.
///
/// Invoked once per rank's reference table (the local one included),
/// before any remote table is released.
pub trait PairwiseHook<S, R> {
    /// Fold one reference partition into the results.
    fn visit_pair(
        &mut self,
        metric: &dyn Metric,
        query: &DistributedTable<S>,
        reference_rank: usize,
        reference: &Table<S>,
        results: &mut R,
    ) -> Result<()>;
}

/// Coordinates preprocessing and exchange for one rank.
pub struct DistributedDualtreeDfs<'w, 'p, P, C, A> {
    world: &'w C,
    arena: &'w A,
    problem: &'p mut P,
    observer: &'w dyn ExchangeObserver,
}

impl<P, C, A> fmt::Debug for DistributedDualtreeDfs<'_, '_, P, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedDualtreeDfs").finish_non_exhaustive()
    }
}

impl<'w, 'p, P, C, A> DistributedDualtreeDfs<'w, 'p, P, C, A>
where
    P: Problem,
    C: TransportChannel,
    A: RemoteTableArena<Table<P::Statistic>>,
{
    /// Bind the process group and problem, zeroing the global tree
    /// statistics of the query table (and of the reference table when it
    /// is a different table).
    pub fn init(world: &'w C, arena: &'w A, problem: &'p mut P) -> Result<Self> {
        reset_statistic(problem.query_table_mut().tree_mut())?;
        if !problem.is_monochromatic() {
            reset_statistic(problem.reference_table_mut().tree_mut())?;
        }

        Ok(Self {
            world,
            arena,
            problem,
            observer: &NoopObserver,
        })
    }

    /// Report exchange progress to `observer`.
    pub fn with_observer(mut self, observer: &'w dyn ExchangeObserver) -> Self {
        self.observer = observer;
        self
    }

    /// The bound problem.
    pub fn problem(&self) -> &P {
        self.problem
    }

    /// The query table.
    pub fn query_table(&self) -> &DistributedTable<P::Statistic> {
        self.problem.query_table()
    }

    /// The reference table.
    pub fn reference_table(&self) -> &DistributedTable<P::Statistic> {
        self.problem.reference_table()
    }

    /// Preprocess and exchange, leaving the serial traversal undone.
    ///
    /// The returned outcome carries [`PendingWork::SerialTraversal`].
    pub fn compute<M: Metric>(
        &mut self,
        metric: &M,
        results: &mut P::Results,
    ) -> Result<ComputeOutcome> {
        let mut outcome = self.run(metric, results, None)?;
        warn!(
            rank = self.world.rank(),
            pairs = self.world.size(),
            "serial dual-tree traversal over exchanged pairs not performed; results hold initial values"
        );
        outcome.pending = PendingWork::SerialTraversal;
        Ok(outcome)
    }

    /// Preprocess, exchange, and run `hook` over every resident pair.
    pub fn compute_with<M, H>(
        &mut self,
        metric: &M,
        results: &mut P::Results,
        hook: &mut H,
    ) -> Result<ComputeOutcome>
    where
        M: Metric,
        H: PairwiseHook<P::Statistic, P::Results>,
    {
        self.run(metric, results, Some(hook))
    }

    fn run<M: Metric>(
        &mut self,
        metric: &M,
        results: &mut P::Results,
        hook: Option<&mut dyn PairwiseHook<P::Statistic, P::Results>>,
    ) -> Result<ComputeOutcome> {
        results.init(self.problem.query_table().n_entries());

        self.preprocess()?;

        let exchanger = HypercubeExchanger::new(self.world, self.arena).with_observer(self.observer);
        let tables = exchanger.all_reduce(self.problem.reference_table().local_table())?;
        let tables_materialized = tables.remote().count();

        let mut pairs_visited = 0;
        if let Some(hook) = hook {
            let query = self.problem.query_table();
            for rank in 0..tables.len() {
                if let Some(reference) = tables.get(rank) {
                    hook.visit_pair(metric, query, rank, reference, results)?;
                    pairs_visited += 1;
                }
            }
        }

        let tables_released = exchanger.release(tables);
        let rounds = self.world.size().trailing_zeros();

        info!(
            rank = self.world.rank(),
            rounds,
            tables_materialized,
            tables_released,
            "distributed exchange complete"
        );

        Ok(ComputeOutcome {
            rounds,
            tables_materialized,
            tables_released,
            pairs_visited,
            pending: PendingWork::None,
        })
    }

    fn preprocess(&mut self) -> Result<()> {
        let query = self.problem.query_table_mut();
        preprocess_query_tree(query.tree_mut())?;
        preprocess_query_tree(query.local_table_mut().tree_mut())?;

        // Global reference statistics only see resident points until a
        // gather-based refinement exists
        let reference = self.problem.reference_table_mut();
        let (global_points, global_tree) = reference.split_global_mut();
        preprocess_reference_tree(global_tree, &global_points)?;
        let (local_points, local_tree) = reference.local_table_mut().split_mut();
        preprocess_reference_tree(local_tree, local_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::HeapArena;
    use crate::statistic::CountStatistic;
    use crate::table::PointSet;
    use crate::transport::local_cluster;
    use crate::tree::TreeBuilder;

    fn single_rank_table(rows: &[Vec<f64>]) -> DistributedTable<CountStatistic> {
        let points = PointSet::from_rows(rows).unwrap();
        let table = Table::build(points, &TreeBuilder::new(2).unwrap());
        DistributedTable::new(0, &[rows.len()], table).unwrap()
    }

    #[test]
    fn test_compute_without_hook_reports_pending_traversal() {
        let world = local_cluster(1, true);
        let arena = HeapArena::unbounded();
        let rows: Vec<Vec<f64>> = (0..7).map(|i| vec![i as f64]).collect();
        let mut problem: GnpProblem<CountStatistic, DistanceResults> =
            GnpProblem::monochromatic(single_rank_table(&rows));
        let mut results = DistanceResults::default();

        let mut dfs = DistributedDualtreeDfs::init(&world[0], &arena, &mut problem).unwrap();
        let outcome = dfs.compute(&EuclideanMetric, &mut results).unwrap();

        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.tables_materialized, 0);
        assert_eq!(outcome.pending, PendingWork::SerialTraversal);
        assert_eq!(results.len(), 7);
        assert!(results.neighbors.iter().all(Option::is_none));
        assert_eq!(dfs.reference_table().tree().stat().count, 7);
        assert_eq!(dfs.query_table().local_table().tree().stat().count, 7);
    }

    #[test]
    fn test_compute_with_hook_visits_own_partition() {
        let world = local_cluster(1, false);
        let arena = HeapArena::unbounded();
        let rows = vec![vec![0.0], vec![1.0], vec![5.0]];
        let mut problem: GnpProblem<CountStatistic, DistanceResults> =
            GnpProblem::monochromatic(single_rank_table(&rows));
        let mut results = DistanceResults::default();
        let mut hook = BruteForceNearest::new(&[3]).excluding_self();

        let mut dfs = DistributedDualtreeDfs::init(&world[0], &arena, &mut problem).unwrap();
        let outcome = dfs
            .compute_with(&EuclideanMetric, &mut results, &mut hook)
            .unwrap();

        assert_eq!(outcome.pairs_visited, 1);
        assert_eq!(outcome.pending, PendingWork::None);
        let mut distances = results.min_distances.clone();
        distances.sort_by(f64::total_cmp);
        assert_eq!(distances, vec![1.0, 1.0, 4.0]);
    }
}
