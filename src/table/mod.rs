//! Tables: point sets paired with a tree over them
//!
//! A [`Table`] is what travels between ranks. A [`DistributedTable`] is one
//! rank's view of a partitioned data set: a global tree whose leaves are
//! rank partitions, plus the local table this rank owns exclusively.

mod points;

pub use points::{GlobalPoints, PointIter, PointSet, PointSource};

use serde::{Deserialize, Serialize};

use crate::tree::{TreeBuilder, TreeNode};
use crate::{GnpError, Result};

/// Point set plus a tree whose nodes index into it.
///
/// `Default` is the zeroed table an arena hands out before a receive
/// fills it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table<S> {
    points: PointSet,
    tree: TreeNode<S>,
}

impl<S: Default> Table<S> {
    /// Build a table and its tree, reordering `points` into node order.
    pub fn build(mut points: PointSet, builder: &TreeBuilder) -> Self {
        let tree = builder.build(&mut points);
        Self { points, tree }
    }
}

impl<S> Table<S> {
    /// Pair an existing tree with its points.
    pub fn from_parts(points: PointSet, tree: TreeNode<S>) -> Self {
        Self { points, tree }
    }

    /// Number of points in the table.
    pub fn n_entries(&self) -> usize {
        self.points.len()
    }

    /// Underlying points.
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    /// Root of the table's tree.
    pub fn tree(&self) -> &TreeNode<S> {
        &self.tree
    }

    /// Mutable root of the table's tree.
    pub fn tree_mut(&mut self) -> &mut TreeNode<S> {
        &mut self.tree
    }

    /// Borrow the points and the tree at once for preprocessing.
    pub fn split_mut(&mut self) -> (&PointSet, &mut TreeNode<S>) {
        (&self.points, &mut self.tree)
    }

    /// Points owned by `node`.
    pub fn node_iter(&self, node: &TreeNode<S>) -> PointIter<'_> {
        self.points.range(node.begin(), node.count())
    }
}

/// One rank's view of a data set partitioned across the process group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedTable<S> {
    rank: usize,
    offset: usize,
    global_entries: usize,
    global_tree: TreeNode<S>,
    local: Table<S>,
}

impl<S: Default> DistributedTable<S> {
    /// Bind `local` as partition `rank` of a data set split into `partition_sizes`.
    pub fn new(rank: usize, partition_sizes: &[usize], local: Table<S>) -> Result<Self> {
        let expected = partition_sizes.get(rank).copied().ok_or_else(|| {
            GnpError::InvalidConfiguration(format!(
                "rank {} outside {} partitions",
                rank,
                partition_sizes.len()
            ))
        })?;
        if expected != local.n_entries() {
            return Err(GnpError::InvalidConfiguration(format!(
                "partition {} declares {} points but local table holds {}",
                rank,
                expected,
                local.n_entries()
            )));
        }

        let global_tree = TreeBuilder::over_partitions(partition_sizes)?;
        Ok(Self {
            rank,
            offset: partition_sizes[..rank].iter().sum(),
            global_entries: partition_sizes.iter().sum(),
            global_tree,
            local,
        })
    }
}

impl<S> DistributedTable<S> {
    /// Rank owning the local partition.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of entries resident on this rank.
    pub fn n_entries(&self) -> usize {
        self.local.n_entries()
    }

    /// Number of entries across every partition.
    pub fn global_n_entries(&self) -> usize {
        self.global_entries
    }

    /// Global index of this rank's first point.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The partition this rank owns.
    pub fn local_table(&self) -> &Table<S> {
        &self.local
    }

    /// Mutable access to the owned partition.
    pub fn local_table_mut(&mut self) -> &mut Table<S> {
        &mut self.local
    }

    /// Root of the global tree.
    pub fn tree(&self) -> &TreeNode<S> {
        &self.global_tree
    }

    /// Mutable root of the global tree.
    pub fn tree_mut(&mut self) -> &mut TreeNode<S> {
        &mut self.global_tree
    }

    /// Resident points addressed by global index.
    pub fn global_points(&self) -> GlobalPoints<'_> {
        GlobalPoints::new(self.local.points(), self.offset)
    }

    /// Resident points of a global-tree node.
    pub fn node_iter(&self, node: &TreeNode<S>) -> PointIter<'_> {
        GlobalPoints::new(&self.local.points, self.offset).range(node.begin(), node.count())
    }

    /// Borrow the global point view and the global tree at once.
    pub fn split_global_mut(&mut self) -> (GlobalPoints<'_>, &mut TreeNode<S>) {
        (
            GlobalPoints::new(&self.local.points, self.offset),
            &mut self.global_tree,
        )
    }
}
