//! Owning binary tree node
//!
//! Node = contiguous point range [begin, begin + count) plus one statistic.
//! Internal nodes own both children outright; a child is destroyed with
//! its parent. The leaf flag is stored rather than derived so that trees
//! arriving from outside (deserialized, hand-assembled) can be checked.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GnpError, Result};

/// Which child of an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildSide {
    /// Lower half of the split.
    Left,
    /// Upper half of the split.
    Right,
}

impl fmt::Display for ChildSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildSide::Left => write!(f, "left"),
            ChildSide::Right => write!(f, "right"),
        }
    }
}

/// Binary tree node with an inline statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode<S> {
    begin: usize,
    count: usize,
    is_leaf: bool,
    left: Option<Box<TreeNode<S>>>,
    right: Option<Box<TreeNode<S>>>,
    stat: S,
}

impl<S: Default> TreeNode<S> {
    /// Create a leaf owning `count` points starting at `begin`.
    pub fn leaf(begin: usize, count: usize) -> Self {
        Self {
            begin,
            count,
            is_leaf: true,
            left: None,
            right: None,
            stat: S::default(),
        }
    }

    /// Create an internal node spanning both children.
    ///
    /// The children are expected to cover adjacent ranges, left first.
    pub fn internal(left: TreeNode<S>, right: TreeNode<S>) -> Self {
        debug_assert_eq!(left.end(), right.begin, "children must be adjacent");

        Self {
            begin: left.begin,
            count: left.count + right.count,
            is_leaf: false,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            stat: S::default(),
        }
    }
}

impl<S: Default> Default for TreeNode<S> {
    fn default() -> Self {
        Self::leaf(0, 0)
    }
}

impl<S> TreeNode<S> {
    /// Assemble a node from raw parts without checking its shape.
    ///
    /// Callers that build trees outside [`crate::TreeBuilder`] use this;
    /// preprocessing reports any internal node lacking a child.
    pub fn from_parts(
        begin: usize,
        count: usize,
        is_leaf: bool,
        left: Option<TreeNode<S>>,
        right: Option<TreeNode<S>>,
        stat: S,
    ) -> Self {
        Self {
            begin,
            count,
            is_leaf,
            left: left.map(Box::new),
            right: right.map(Box::new),
            stat,
        }
    }

    /// First point index owned by this node.
    #[inline]
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// Number of points owned by this node.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// One past the last point index owned by this node.
    #[inline]
    pub fn end(&self) -> usize {
        self.begin + self.count
    }

    /// Check if leaf
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Left child, if present.
    pub fn left(&self) -> Option<&TreeNode<S>> {
        self.left.as_deref()
    }

    /// Right child, if present.
    pub fn right(&self) -> Option<&TreeNode<S>> {
        self.right.as_deref()
    }

    /// Child on the given side, if present.
    pub fn child(&self, side: ChildSide) -> Option<&TreeNode<S>> {
        match side {
            ChildSide::Left => self.left(),
            ChildSide::Right => self.right(),
        }
    }

    /// Statistic stored at this node.
    pub fn stat(&self) -> &S {
        &self.stat
    }

    /// Mutable statistic stored at this node.
    pub fn stat_mut(&mut self) -> &mut S {
        &mut self.stat
    }

    /// Split an internal node into its statistic and both children.
    ///
    /// `depth` is only used to label a structural violation.
    pub fn children_mut(
        &mut self,
        depth: usize,
    ) -> Result<(&mut S, &mut TreeNode<S>, &mut TreeNode<S>)> {
        match (self.left.as_deref_mut(), self.right.as_deref_mut()) {
            (Some(left), Some(right)) => Ok((&mut self.stat, left, right)),
            (None, _) => Err(GnpError::StructuralInvariantViolation {
                depth,
                side: ChildSide::Left,
            }),
            (_, None) => Err(GnpError::StructuralInvariantViolation {
                depth,
                side: ChildSide::Right,
            }),
        }
    }
}

impl<S> fmt::Display for TreeNode<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf {
            write!(f, "leaf[{}, {})", self.begin, self.end())
        } else {
            write!(f, "node[{}, {})", self.begin, self.end())
        }
    }
}
