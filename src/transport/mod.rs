//! Non-blocking rank-to-rank messaging
//!
//! Operations are posted first and completed later by `wait_all`. A send
//! hands its payload to the transport; a receive names the peer and tag it
//! expects and yields the payload on completion. Posted operations carry
//! no ordering among themselves.

mod local;
#[cfg(feature = "mpi")]
mod message_passing;

pub use local::{local_cluster, LocalTransport};
#[cfg(feature = "mpi")]
pub use message_passing::MpiTransport;

use thiserror::Error;

/// Handle for a posted, not yet completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// Outgoing payload to `dest` under `tag`.
    Send {
        /// Destination rank.
        dest: usize,
        /// Message tag.
        tag: usize,
    },
    /// Expected payload from `src` under `tag`.
    Receive {
        /// Source rank.
        src: usize,
        /// Message tag.
        tag: usize,
    },
}

/// Outcome of a completed operation, in the order the requests were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The send has left this rank.
    Sent {
        /// Destination rank.
        dest: usize,
        /// Message tag.
        tag: usize,
    },
    /// The receive matched a message.
    Received {
        /// Source rank.
        src: usize,
        /// Message tag.
        tag: usize,
        /// Message body.
        payload: Vec<u8>,
    },
}

/// Failures raised by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer's endpoint is gone; the operation can never complete.
    #[error("peer {peer} disconnected")]
    PeerDisconnected {
        /// Rank that went away.
        peer: usize,
    },

    /// A rank outside the group (or this rank itself) was addressed.
    #[error("rank {rank} is not a valid peer in a group of {size}")]
    InvalidRank {
        /// Offending rank.
        rank: usize,
        /// Group size.
        size: usize,
    },

    /// The tag cannot be represented on the underlying wire.
    #[error("tag {tag} exceeds the transport's tag range")]
    TagOutOfRange {
        /// Offending tag.
        tag: usize,
    },

    /// The received payload does not match the digest computed by the sender.
    #[error("payload from rank {src} with tag {tag} failed its integrity check")]
    ChecksumMismatch {
        /// Sending rank.
        src: usize,
        /// Message tag.
        tag: usize,
    },
}

/// Ranked, non-blocking point-to-point channel between processes.
pub trait TransportChannel {
    /// This process's rank in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Post a send of `payload` to `dest`.
    fn isend(&self, dest: usize, tag: usize, payload: Vec<u8>) -> Result<Request, TransportError>;

    /// Post a receive of the message `src` sends under `tag`.
    fn irecv(&self, src: usize, tag: usize) -> Result<Request, TransportError>;

    /// Block until every request has completed.
    fn wait_all(&self, requests: Vec<Request>) -> Result<Vec<Completion>, TransportError>;
}
