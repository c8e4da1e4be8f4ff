//! Problem binding: which tables play query and reference, and where results go

use std::marker::PhantomData;

use crate::statistic::Statistic;
use crate::table::DistributedTable;

/// Per-query result storage.
pub trait QueryResults {
    /// Size storage for `n_entries` query points and reset it.
    fn init(&mut self, n_entries: usize);
}

/// Nearest-reference distance per query point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceResults {
    /// Smallest distance seen so far (`f64::INFINITY` if none).
    pub min_distances: Vec<f64>,
    /// Global index of the reference point achieving it.
    pub neighbors: Vec<Option<usize>>,
}

impl DistanceResults {
    /// Record a candidate for query `q`; keeps the smaller distance.
    pub fn offer(&mut self, q: usize, distance: f64, reference: usize) {
        if distance < self.min_distances[q] {
            self.min_distances[q] = distance;
            self.neighbors[q] = Some(reference);
        }
    }

    /// Number of query points.
    pub fn len(&self) -> usize {
        self.min_distances.len()
    }

    /// Whether no query points are stored.
    pub fn is_empty(&self) -> bool {
        self.min_distances.is_empty()
    }
}

impl QueryResults for DistanceResults {
    fn init(&mut self, n_entries: usize) {
        self.min_distances = vec![f64::INFINITY; n_entries];
        self.neighbors = vec![None; n_entries];
    }
}

/// A generalized N-body problem instance as seen by one rank.
pub trait Problem {
    /// Statistic kept at every tree node.
    type Statistic: Statistic;
    /// Result storage for query points.
    type Results: QueryResults;

    /// Query side.
    fn query_table(&self) -> &DistributedTable<Self::Statistic>;

    /// Reference side (the query table itself when monochromatic).
    fn reference_table(&self) -> &DistributedTable<Self::Statistic>;

    /// Mutable query side.
    fn query_table_mut(&mut self) -> &mut DistributedTable<Self::Statistic>;

    /// Mutable reference side.
    fn reference_table_mut(&mut self) -> &mut DistributedTable<Self::Statistic>;

    /// Whether query and reference are the same table.
    fn is_monochromatic(&self) -> bool;
}

/// Problem over owned distributed tables.
#[derive(Debug, Clone)]
pub struct GnpProblem<S, R> {
    query: DistributedTable<S>,
    reference: Option<DistributedTable<S>>,
    _results: PhantomData<fn() -> R>,
}

impl<S, R> GnpProblem<S, R> {
    /// Query and reference are one table.
    pub fn monochromatic(table: DistributedTable<S>) -> Self {
        Self {
            query: table,
            reference: None,
            _results: PhantomData,
        }
    }

    /// Separate query and reference tables.
    pub fn bichromatic(query: DistributedTable<S>, reference: DistributedTable<S>) -> Self {
        Self {
            query,
            reference: Some(reference),
            _results: PhantomData,
        }
    }
}

impl<S: Statistic, R: QueryResults> Problem for GnpProblem<S, R> {
    type Statistic = S;
    type Results = R;

    fn query_table(&self) -> &DistributedTable<S> {
        &self.query
    }

    fn reference_table(&self) -> &DistributedTable<S> {
        self.reference.as_ref().unwrap_or(&self.query)
    }

    fn query_table_mut(&mut self) -> &mut DistributedTable<S> {
        &mut self.query
    }

    fn reference_table_mut(&mut self) -> &mut DistributedTable<S> {
        match self.reference.as_mut() {
            Some(reference) => reference,
            None => &mut self.query,
        }
    }

    fn is_monochromatic(&self) -> bool {
        self.reference.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_init_and_offer() {
        let mut results = DistanceResults::default();
        results.init(3);
        assert_eq!(results.len(), 3);
        assert!(results.min_distances.iter().all(|d| d.is_infinite()));

        results.offer(1, 2.5, 10);
        results.offer(1, 4.0, 11);
        assert_eq!(results.min_distances[1], 2.5);
        assert_eq!(results.neighbors[1], Some(10));
    }
}
