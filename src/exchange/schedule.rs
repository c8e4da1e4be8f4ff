//! Recursive-doubling pairing schedule
//!
//! Round r (1-based) groups ranks into blocks of stride = 2^r:
//!   leader  = rank - rank mod stride
//!   end     = leader + stride - 1
//!   partner = leader + stride - 1 - (rank - leader)
//! Each side moves 2^(r-1) slots. The half nearer the leader sends the
//! lower slot range [leader, leader + n) and receives the upper one; the
//! other half does the reverse.

use std::fmt;
use std::ops::Range;

use crate::{GnpError, Result};

/// One rank's view of one exchange round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    /// Round number, starting at 1.
    pub round: u32,
    /// Rank this plan belongs to.
    pub rank: usize,
    /// Group size `2^round`.
    pub stride: usize,
    /// Slots moved in each direction, `2^(round - 1)`.
    pub num_tables_in_action: usize,
    /// First rank of the group.
    pub group_leader: usize,
    /// Last rank of the group.
    pub group_end: usize,
    /// Rank this process exchanges with.
    pub partner: usize,
}

impl RoundPlan {
    /// Compute the plan for `rank` in `round` (1-based).
    ///
    /// Round 0 and rounds whose group would not fit in a `usize` are
    /// rejected.
    pub fn new(rank: usize, round: u32) -> Result<Self> {
        if round == 0 || round >= usize::BITS {
            return Err(GnpError::InvalidConfiguration(format!(
                "round {} outside 1..{}",
                round,
                usize::BITS
            )));
        }
        Ok(Self::for_round(rank, round))
    }

    /// `round` must lie in `1..usize::BITS`.
    fn for_round(rank: usize, round: u32) -> Self {
        let stride = 1usize << round;
        let group_offset = rank % stride;
        let group_leader = rank - group_offset;
        let group_end = group_leader + stride - 1;

        Self {
            round,
            rank,
            stride,
            num_tables_in_action: stride >> 1,
            group_leader,
            group_end,
            partner: group_leader + stride - group_offset - 1,
        }
    }

    /// Whether this rank sends the lower half of the group's slots.
    #[inline]
    pub fn sends_lower_half(&self) -> bool {
        self.rank - self.group_leader < self.group_end - self.rank
    }

    /// Slots this rank sends to its partner.
    pub fn send_ids(&self) -> Range<usize> {
        if self.sends_lower_half() {
            self.lower_half()
        } else {
            self.upper_half()
        }
    }

    /// Slots this rank receives from its partner.
    pub fn receive_ids(&self) -> Range<usize> {
        if self.sends_lower_half() {
            self.upper_half()
        } else {
            self.lower_half()
        }
    }

    fn lower_half(&self) -> Range<usize> {
        self.group_leader..self.group_leader + self.num_tables_in_action
    }

    fn upper_half(&self) -> Range<usize> {
        self.group_leader + self.num_tables_in_action..self.group_end + 1
    }
}

impl fmt::Display for RoundPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let send = self.send_ids();
        let recv = self.receive_ids();
        write!(
            f,
            "round {}: rank {} <-> {} (group [{}, {}]) sends [{}, {}) receives [{}, {})",
            self.round,
            self.rank,
            self.partner,
            self.group_leader,
            self.group_end,
            send.start,
            send.end,
            recv.start,
            recv.end
        )
    }
}

/// All rounds of the all-reduce for one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HypercubeSchedule {
    rank: usize,
    size: usize,
    num_rounds: u32,
}

impl HypercubeSchedule {
    /// Validate the group shape and build the schedule.
    ///
    /// `size` must be a power of two (1 is allowed and yields no rounds).
    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if !size.is_power_of_two() {
            return Err(GnpError::UnsupportedTopology { size });
        }
        if rank >= size {
            return Err(GnpError::InvalidConfiguration(format!(
                "rank {} outside a group of {}",
                rank, size
            )));
        }

        Ok(Self {
            rank,
            size,
            num_rounds: size.trailing_zeros(),
        })
    }

    /// Number of rounds, `log2(size)`.
    pub fn num_rounds(&self) -> u32 {
        self.num_rounds
    }

    /// Group size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Plans for rounds `1..=log2(size)` in order.
    pub fn rounds(&self) -> impl Iterator<Item = RoundPlan> + '_ {
        (1..=self.num_rounds).map(move |round| RoundPlan::for_round(self.rank, round))
    }
}
