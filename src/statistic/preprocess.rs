//! Statistic preprocessing passes
//!
//! Query trees are only zeroed (pre-order). Reference trees are reduced
//! bottom-up (strict post-order): a node's combine step runs only after
//! both children are finished. Every node is visited exactly once and
//! recursion depth equals tree height.

use super::Statistic;
use crate::table::PointSource;
use crate::tree::TreeNode;
use crate::Result;

/// Zero every statistic in the tree, parent before children, left before right.
pub fn reset_statistic<S: Statistic>(node: &mut TreeNode<S>) -> Result<()> {
    reset_recursion(node, 0)
}

/// Seed a query tree's statistics (zero pass only).
pub fn preprocess_query_tree<S: Statistic>(node: &mut TreeNode<S>) -> Result<()> {
    reset_recursion(node, 0)
}

/// Reduce a reference tree's statistics bottom-up from the points in `points`.
pub fn preprocess_reference_tree<S, P>(node: &mut TreeNode<S>, points: &P) -> Result<()>
where
    S: Statistic,
    P: PointSource + ?Sized,
{
    reference_recursion(node, points, 0)
}

fn reset_recursion<S: Statistic>(node: &mut TreeNode<S>, depth: usize) -> Result<()> {
    node.stat_mut().set_zero();
    if node.is_leaf() {
        return Ok(());
    }

    let (_, left, right) = node.children_mut(depth)?;
    reset_recursion(left, depth + 1)?;
    reset_recursion(right, depth + 1)
}

fn reference_recursion<S, P>(node: &mut TreeNode<S>, points: &P, depth: usize) -> Result<()>
where
    S: Statistic,
    P: PointSource + ?Sized,
{
    let node_points = points.node_points(node.begin(), node.count());

    if node.is_leaf() {
        node.stat_mut().init_leaf(node_points);
        return Ok(());
    }

    let (stat, left, right) = node.children_mut(depth)?;
    reference_recursion(left, points, depth + 1)?;
    reference_recursion(right, points, depth + 1)?;

    stat.init_from_children(node_points, left.stat(), right.stat());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistic::CountStatistic;
    use crate::table::PointSet;
    use crate::tree::TreeBuilder;

    #[test]
    fn test_reference_counts_match_ranges() {
        let rows: Vec<Vec<f64>> = (0..23).map(|i| vec![(i * 13 % 23) as f64]).collect();
        let mut points = PointSet::from_rows(&rows).unwrap();
        let mut tree: TreeNode<CountStatistic> = TreeBuilder::new(3).unwrap().build(&mut points);

        preprocess_reference_tree(&mut tree, &points).unwrap();
        for (node, _) in tree.iter_pre_order() {
            assert_eq!(node.stat().count, node.count(), "node {}", node);
        }

        reset_statistic(&mut tree).unwrap();
        assert!(tree.iter_pre_order().all(|(node, _)| node.stat().count == 0));
    }
}
