//! Median-split tree construction
//!
//! Each internal node splits its range at the median along the widest
//! dimension of its points. Points are permuted into node order so that
//! every node owns a contiguous range.

use super::TreeNode;
use crate::table::PointSet;
use crate::{GnpError, Result};

/// Builds balanced binary trees over point sets and rank partitions.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder {
    leaf_size: usize,
}

impl TreeBuilder {
    /// Create a builder that stops splitting at `leaf_size` points.
    pub fn new(leaf_size: usize) -> Result<Self> {
        if leaf_size == 0 {
            return Err(GnpError::InvalidConfiguration(
                "leaf size must be > 0".to_string(),
            ));
        }
        Ok(Self { leaf_size })
    }

    /// Maximum number of points in a leaf.
    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    /// Build a tree over `points`, reordering them into node order.
    pub fn build<S: Default>(&self, points: &mut PointSet) -> TreeNode<S> {
        let mut order: Vec<usize> = (0..points.len()).collect();
        let tree = self.split(points, &mut order, 0);
        points.permute(&order);
        tree
    }

    fn split<S: Default>(&self, points: &PointSet, order: &mut [usize], begin: usize) -> TreeNode<S> {
        let count = order.len();
        if count <= self.leaf_size {
            return TreeNode::leaf(begin, count);
        }

        let dim = widest_dimension(points, order);
        order.sort_unstable_by(|&a, &b| points.coord(a, dim).total_cmp(&points.coord(b, dim)));

        let mid = count / 2;
        let (lower, upper) = order.split_at_mut(mid);
        let left = self.split(points, lower, begin);
        let right = self.split(points, upper, begin + mid);
        TreeNode::internal(left, right)
    }

    /// Build the top-level tree whose leaves are rank partitions.
    ///
    /// Leaf `r` spans `[offset_r, offset_r + sizes[r])` in global point
    /// order, where `offset_r` is the sum of the preceding sizes.
    pub fn over_partitions<S: Default>(sizes: &[usize]) -> Result<TreeNode<S>> {
        if sizes.is_empty() {
            return Err(GnpError::InvalidConfiguration(
                "at least one partition is required".to_string(),
            ));
        }

        let mut offsets = Vec::with_capacity(sizes.len());
        let mut running = 0;
        for &size in sizes {
            offsets.push(running);
            running += size;
        }

        Ok(partition_node(sizes, &offsets))
    }
}

fn partition_node<S: Default>(sizes: &[usize], offsets: &[usize]) -> TreeNode<S> {
    if sizes.len() == 1 {
        return TreeNode::leaf(offsets[0], sizes[0]);
    }
    let mid = sizes.len() / 2;
    TreeNode::internal(
        partition_node(&sizes[..mid], &offsets[..mid]),
        partition_node(&sizes[mid..], &offsets[mid..]),
    )
}

fn widest_dimension(points: &PointSet, order: &[usize]) -> usize {
    let mut best_dim = 0;
    let mut best_spread = f64::NEG_INFINITY;

    for dim in 0..points.dims() {
        let (lo, hi) = order.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let value = points.coord(i, dim);
            (lo.min(value), hi.max(value))
        });
        if hi - lo > best_spread {
            best_spread = hi - lo;
            best_dim = dim;
        }
    }

    best_dim
}
