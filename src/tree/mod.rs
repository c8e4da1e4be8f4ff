//! Space-partitioning tree
//!
//! Binary tree whose nodes own contiguous point ranges. Internal nodes own
//! their two children exclusively; there is no shared ownership and no
//! parent pointer. Each node carries one statistic inline.

mod builder;
mod node;
mod traversal;

pub use builder::TreeBuilder;
pub use node::{ChildSide, TreeNode};
pub use traversal::PreOrder;
