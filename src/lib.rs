//! # Distributed Dual-Tree Preprocessing and Exchange
//!
//! Coordination layer for generalized N-body problems (nearest neighbor,
//! density-style queries) whose query and reference point sets are
//! partitioned across a group of cooperating ranks.
//!
//! ## Core Pieces
//!
//! 1. **Statistic preprocessing**: zero-reset passes over query trees and a
//!    strict post-order reduction over reference trees
//! 2. **Hypercube all-reduce**: `log2(P)` rounds of pairwise exchange after
//!    which every rank holds every other rank's reference partition
//! 3. **Remote table lifecycle**: tables received from peers are allocated
//!    through an explicit arena handle and released exactly once
//!
//! Ranks talk through a [`TransportChannel`]. [`LocalTransport`] runs a
//! whole group in one process, one thread per rank; with the `mpi` feature
//! `MpiTransport` runs one rank per MPI process.
//!
//! ## Usage Example
//!
//! ```ignore
//! use dualtree_dist::{DistributedDualtreeDfs, GnpProblem, HeapArena, local_cluster};
//!
//! let mut world = local_cluster(4, true);
//! let transport = world.remove(0);
//! let arena = HeapArena::unbounded();
//! let mut dfs = DistributedDualtreeDfs::init(&transport, &arena, &mut problem)?;
//! let outcome = dfs.compute(&EuclideanMetric, &mut results)?;
//! assert_eq!(outcome.rounds, 2);
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod align;      // Standalone dynamic time warping
pub mod arena;      // Cross-rank table allocation
pub mod config;     // Tunables shared by the driver and library
pub mod controller; // Top-level distributed dual-tree orchestration
pub mod exchange;   // Hypercube all-reduce of reference partitions
pub mod statistic;  // Per-node statistics and preprocessing passes
pub mod table;      // Point sets, local tables, distributed tables
pub mod transport;  // Non-blocking rank-to-rank messaging
pub mod tree;       // Owning binary space-partitioning tree

pub use arena::{ArenaStats, HeapArena, RemoteTableArena};
pub use config::DualtreeConfig;
pub use controller::{
    BruteForceNearest, ComputeOutcome, DistanceResults, DistributedDualtreeDfs, EuclideanMetric,
    GnpProblem, Metric, PairwiseHook, PendingWork, Problem, QueryResults,
};
pub use exchange::{
    ExchangeEvent, ExchangeObserver, HypercubeExchanger, HypercubeSchedule, RemoteTables,
    RoundPlan,
};
pub use statistic::{BoundStatistic, CountStatistic, Statistic};
pub use table::{DistributedTable, PointIter, PointSet, PointSource, Table};
pub use transport::{local_cluster, LocalTransport, TransportChannel, TransportError};
#[cfg(feature = "mpi")]
pub use transport::MpiTransport;
pub use tree::{ChildSide, TreeBuilder, TreeNode};

use thiserror::Error;

/// Errors surfaced by preprocessing, exchange, and orchestration.
///
/// Every variant is fatal at this layer: nothing is retried and no partial
/// result is produced.
#[derive(Error, Debug)]
pub enum GnpError {
    /// A node reported itself as internal but is missing a child.
    #[error("structural invariant violated: internal node at depth {depth} has no {side} child")]
    StructuralInvariantViolation {
        /// Depth of the malformed node (root = 0).
        depth: usize,
        /// Which child was missing.
        side: ChildSide,
    },

    /// Sending, receiving, or waiting on a transfer failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The process group size is not an exact power of two.
    #[error("unsupported topology: {size} ranks is not a power of two")]
    UnsupportedTopology {
        /// Number of ranks in the group.
        size: usize,
    },

    /// The arena could not provide another table.
    #[error("arena exhausted: capacity {capacity} tables")]
    AllocationFailure {
        /// Maximum number of live tables the arena permits.
        capacity: usize,
    },

    /// A slot expected to hold (or receive) a table did not.
    #[error("slot {slot} unavailable in exchange round {round}")]
    SlotUnavailable {
        /// Slot (rank) id.
        slot: usize,
        /// Round in which it was needed.
        round: u32,
    },

    /// A table could not be encoded or decoded for transfer.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration or input parameters were rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An input file could not be parsed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Reading an input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for GnpError {
    fn from(err: bincode::Error) -> Self {
        GnpError::Serialization(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GnpError>;
