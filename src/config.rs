//! Tunables shared by the driver and the library

use crate::arena::HeapArena;
use crate::transport::{local_cluster, LocalTransport};
use crate::tree::TreeBuilder;
use crate::{GnpError, Result};

/// Default maximum number of points per leaf.
pub const DEFAULT_LEAF_SIZE: usize = 16;

/// Configuration for building tables and running the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualtreeConfig {
    /// Maximum points per tree leaf.
    pub leaf_size: usize,
    /// Upper bound on live remote tables in the arena (`None` = unbounded).
    pub arena_capacity: Option<usize>,
    /// Verify payload digests on receive.
    pub verify_checksums: bool,
    /// Enable verbose logging.
    pub verbose: bool,
}

impl Default for DualtreeConfig {
    fn default() -> Self {
        Self {
            leaf_size: DEFAULT_LEAF_SIZE,
            arena_capacity: None,
            verify_checksums: true,
            verbose: false,
        }
    }
}

impl DualtreeConfig {
    /// Set the leaf size.
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// Bound the arena.
    pub fn with_arena_capacity(mut self, capacity: Option<usize>) -> Self {
        self.arena_capacity = capacity;
        self
    }

    /// Enable or disable digest verification.
    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    /// Enable verbose mode.
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Reject unusable settings.
    pub fn validate(&self) -> Result<()> {
        if self.leaf_size == 0 {
            return Err(GnpError::InvalidConfiguration(
                "leaf size must be > 0".to_string(),
            ));
        }
        if self.arena_capacity == Some(0) {
            return Err(GnpError::InvalidConfiguration(
                "arena capacity must be > 0 when bounded".to_string(),
            ));
        }
        Ok(())
    }

    /// Tree builder using the configured leaf size.
    pub fn tree_builder(&self) -> Result<TreeBuilder> {
        self.validate()?;
        TreeBuilder::new(self.leaf_size)
    }

    /// Fresh arena honouring the configured capacity.
    pub fn arena(&self) -> HeapArena {
        HeapArena::new(self.arena_capacity)
    }

    /// In-process group of `size` ranks.
    ///
    /// Any size is accepted here; non power-of-two groups are rejected by
    /// the exchange itself.
    pub fn cluster(&self, size: usize) -> Result<Vec<LocalTransport>> {
        if size == 0 {
            return Err(GnpError::InvalidConfiguration(
                "cluster needs at least one rank".to_string(),
            ));
        }
        Ok(local_cluster(size, self.verify_checksums))
    }
}
