//! Per-node aggregate statistics
//!
//! A statistic is reset to a neutral value, seeded at a leaf from the
//! points it owns, or built at an internal node from its two children
//! (left first, right second; the combine need not be commutative).

mod preprocess;

pub use preprocess::{preprocess_query_tree, preprocess_reference_tree, reset_statistic};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::table::PointIter;

/// Aggregatable per-node summary.
///
/// Statistics live inside tables and therefore travel between ranks, so
/// they must round-trip through serde.
pub trait Statistic: Default + Clone + std::fmt::Debug + Serialize + DeserializeOwned {
    /// Reset to the neutral value.
    fn set_zero(&mut self);

    /// Initialise a leaf from the points it owns.
    fn init_leaf(&mut self, points: PointIter<'_>);

    /// Initialise an internal node from its children's finished statistics.
    fn init_from_children(&mut self, points: PointIter<'_>, left: &Self, right: &Self);
}

/// Number of points below a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStatistic {
    /// Points counted.
    pub count: usize,
}

impl Statistic for CountStatistic {
    fn set_zero(&mut self) {
        self.count = 0;
    }

    fn init_leaf(&mut self, points: PointIter<'_>) {
        self.count = points.len();
    }

    fn init_from_children(&mut self, _points: PointIter<'_>, left: &Self, right: &Self) {
        self.count = left.count + right.count;
    }
}

/// Point count plus an axis-aligned bounding box.
///
/// An empty statistic has empty bound vectors rather than infinite
/// extents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundStatistic {
    /// Points covered.
    pub count: usize,
    /// Per-dimension lower corner.
    pub min: Vec<f64>,
    /// Per-dimension upper corner.
    pub max: Vec<f64>,
}

impl BoundStatistic {
    /// Whether any point has been absorbed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn absorb_point(&mut self, point: &[f64]) {
        if self.min.is_empty() {
            self.min = point.to_vec();
            self.max = point.to_vec();
        } else {
            for (d, &x) in point.iter().enumerate() {
                self.min[d] = self.min[d].min(x);
                self.max[d] = self.max[d].max(x);
            }
        }
        self.count += 1;
    }

    fn absorb_bounds(&mut self, other: &BoundStatistic) {
        if other.is_empty() {
            return;
        }
        if self.min.is_empty() {
            self.min = other.min.clone();
            self.max = other.max.clone();
        } else {
            for d in 0..self.min.len() {
                self.min[d] = self.min[d].min(other.min[d]);
                self.max[d] = self.max[d].max(other.max[d]);
            }
        }
        self.count += other.count;
    }

    /// Smallest squared distance from `point` to the box (0 inside).
    pub fn min_distance_sq(&self, point: &[f64]) -> f64 {
        self.min
            .iter()
            .zip(&self.max)
            .zip(point)
            .map(|((&lo, &hi), &x)| {
                let gap = if x < lo {
                    lo - x
                } else if x > hi {
                    x - hi
                } else {
                    0.0
                };
                gap * gap
            })
            .sum()
    }
}

impl Statistic for BoundStatistic {
    fn set_zero(&mut self) {
        self.count = 0;
        self.min.clear();
        self.max.clear();
    }

    fn init_leaf(&mut self, points: PointIter<'_>) {
        self.set_zero();
        for point in points {
            self.absorb_point(point);
        }
    }

    fn init_from_children(&mut self, _points: PointIter<'_>, left: &Self, right: &Self) {
        self.set_zero();
        self.absorb_bounds(left);
        self.absorb_bounds(right);
    }
}
