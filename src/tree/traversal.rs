//! Explicit-stack pre-order traversal
//!
//! Stack depth: O(height). Missing children of a malformed internal node
//! are skipped here; `validate` is the place that reports them.

use super::{ChildSide, TreeNode};
use crate::{GnpError, Result};

/// Pre-order iterator yielding `(node, depth)` pairs, left before right.
#[derive(Debug)]
pub struct PreOrder<'a, S> {
    stack: Vec<(&'a TreeNode<S>, usize)>,
}

impl<'a, S> PreOrder<'a, S> {
    /// Start a traversal at `root` (depth 0).
    pub fn new(root: &'a TreeNode<S>) -> Self {
        Self {
            stack: vec![(root, 0)],
        }
    }
}

impl<'a, S> Iterator for PreOrder<'a, S> {
    type Item = (&'a TreeNode<S>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        if !node.is_leaf() {
            // Right pushed first so left is visited first
            if let Some(right) = node.right() {
                self.stack.push((right, depth + 1));
            }
            if let Some(left) = node.left() {
                self.stack.push((left, depth + 1));
            }
        }
        Some((node, depth))
    }
}

impl<S> TreeNode<S> {
    /// Iterate over this subtree in pre-order.
    pub fn iter_pre_order(&self) -> PreOrder<'_, S> {
        PreOrder::new(self)
    }

    /// Number of reachable nodes in this subtree.
    pub fn node_count(&self) -> usize {
        self.iter_pre_order().count()
    }

    /// Height of this subtree (a lone leaf has height 0).
    pub fn height(&self) -> usize {
        self.iter_pre_order()
            .map(|(_, depth)| depth)
            .max()
            .unwrap_or(0)
    }

    /// Check that every internal node owns both children.
    pub fn validate(&self) -> Result<()> {
        for (node, depth) in self.iter_pre_order() {
            if node.is_leaf() {
                continue;
            }
            for side in [ChildSide::Left, ChildSide::Right] {
                if node.child(side).is_none() {
                    return Err(GnpError::StructuralInvariantViolation { depth, side });
                }
            }
        }
        Ok(())
    }
}
