//! Brute-force nearest-neighbour pass over resident pairs

use tracing::trace;

use super::{DistanceResults, Metric, PairwiseHook};
use crate::table::{DistributedTable, Table};
use crate::{GnpError, Result};

/// Scans every (query point, reference point) pair of each partition.
///
/// Reference indices are reported globally, using the reference
/// partition sizes to place each rank's points.
#[derive(Debug, Clone)]
pub struct BruteForceNearest {
    offsets: Vec<usize>,
    exclude_self: bool,
}

impl BruteForceNearest {
    /// Hook for reference partitions of the given sizes (one per rank).
    pub fn new(reference_partition_sizes: &[usize]) -> Self {
        let offsets = reference_partition_sizes
            .iter()
            .scan(0, |acc, &size| {
                let begin = *acc;
                *acc += size;
                Some(begin)
            })
            .collect();
        Self {
            offsets,
            exclude_self: false,
        }
    }

    /// Skip a query point's match against itself (monochromatic problems).
    pub fn excluding_self(mut self) -> Self {
        self.exclude_self = true;
        self
    }
}

impl<S> PairwiseHook<S, DistanceResults> for BruteForceNearest {
    fn visit_pair(
        &mut self,
        metric: &dyn Metric,
        query: &DistributedTable<S>,
        reference_rank: usize,
        reference: &Table<S>,
        results: &mut DistanceResults,
    ) -> Result<()> {
        let offset = *self.offsets.get(reference_rank).ok_or_else(|| {
            GnpError::InvalidConfiguration(format!(
                "no partition size for reference rank {}",
                reference_rank
            ))
        })?;

        let query_points = query.local_table().points();
        let reference_points = reference.points();
        trace!(
            reference_rank,
            queries = query_points.len(),
            references = reference_points.len(),
            "brute-force pair"
        );

        for q in 0..query_points.len() {
            let global_q = query.offset() + q;
            for r in 0..reference_points.len() {
                let global_r = offset + r;
                if self.exclude_self && global_q == global_r {
                    continue;
                }
                let distance = metric.distance(query_points.point(q), reference_points.point(r));
                results.offer(q, distance, global_r);
            }
        }
        Ok(())
    }
}
