//! MPI transport: one endpoint per process
//!
//! Every message travels as two MPI messages from the same sender: a
//! fixed-size header carrying the payload length and its blake3 digest,
//! then the payload itself under a companion tag. `wait_all` first trades
//! headers so receive buffers can be sized, then posts every payload send
//! and receive as an immediate operation and waits on all of them.
//!
//! MPI's default error handler aborts the job when communication fails, so
//! this transport never reports `PeerDisconnected`.

use std::cell::RefCell;
use std::fmt;

use mpi::topology::{Rank, SimpleCommunicator};
use mpi::traits::*;
use mpi::Tag;
use tracing::trace;

use super::{Completion, Request, TransportChannel, TransportError};

const HEADER_LEN: usize = 8 + blake3::OUT_LEN;

type Header = [u8; HEADER_LEN];

/// A send staged by `isend`, put on the wire by `wait_all`.
struct Staged {
    dest: usize,
    tag: usize,
    header: Header,
    payload: Vec<u8>,
}

/// Endpoint of an MPI process group.
pub struct MpiTransport {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
    staged: RefCell<Vec<Staged>>,
    verify_checksums: bool,
}

impl fmt::Debug for MpiTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpiTransport")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("staged", &self.staged.borrow().len())
            .field("verify_checksums", &self.verify_checksums)
            .finish()
    }
}

impl MpiTransport {
    /// Wrap a communicator, usually `universe.world()`.
    pub fn new(world: SimpleCommunicator, verify_checksums: bool) -> Self {
        let rank = usize::try_from(world.rank()).unwrap_or_default();
        let size = usize::try_from(world.size()).unwrap_or_default();
        Self {
            world,
            rank,
            size,
            staged: RefCell::new(Vec::new()),
            verify_checksums,
        }
    }

    fn check_peer(&self, peer: usize) -> Result<Rank, TransportError> {
        let invalid = TransportError::InvalidRank {
            rank: peer,
            size: self.size,
        };
        if peer >= self.size || peer == self.rank {
            return Err(invalid);
        }
        Rank::try_from(peer).map_err(|_| invalid)
    }
}

/// Header and payload tags for a slot tag.
fn wire_tags(tag: usize) -> Result<(Tag, Tag), TransportError> {
    let out_of_range = TransportError::TagOutOfRange { tag };
    let header = tag.checked_mul(2).ok_or(out_of_range.clone())?;
    let header = Tag::try_from(header).map_err(|_| out_of_range.clone())?;
    let payload = header.checked_add(1).ok_or(out_of_range)?;
    Ok((header, payload))
}

fn encode_header(payload: &[u8]) -> Header {
    let mut header = [0u8; HEADER_LEN];
    header[..8].copy_from_slice(&(payload.len() as u64).to_le_bytes());
    header[8..].copy_from_slice(blake3::hash(payload).as_bytes());
    header
}

fn decode_header(header: &Header) -> (usize, blake3::Hash) {
    let mut len = [0u8; 8];
    len.copy_from_slice(&header[..8]);
    let mut digest = [0u8; blake3::OUT_LEN];
    digest.copy_from_slice(&header[8..]);
    (u64::from_le_bytes(len) as usize, blake3::Hash::from(digest))
}

impl TransportChannel for MpiTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, dest: usize, tag: usize, payload: Vec<u8>) -> Result<Request, TransportError> {
        self.check_peer(dest)?;
        wire_tags(tag)?;

        trace!(rank = self.rank, dest, tag, bytes = payload.len(), "staging send");
        self.staged.borrow_mut().push(Staged {
            dest,
            tag,
            header: encode_header(&payload),
            payload,
        });
        Ok(Request::Send { dest, tag })
    }

    fn irecv(&self, src: usize, tag: usize) -> Result<Request, TransportError> {
        self.check_peer(src)?;
        wire_tags(tag)?;
        trace!(rank = self.rank, src, tag, "posting receive");
        Ok(Request::Receive { src, tag })
    }

    fn wait_all(&self, requests: Vec<Request>) -> Result<Vec<Completion>, TransportError> {
        let (sends, kept): (Vec<Staged>, Vec<Staged>) =
            self.staged.borrow_mut().drain(..).partition(|staged| {
                requests.contains(&Request::Send {
                    dest: staged.dest,
                    tag: staged.tag,
                })
            });
        *self.staged.borrow_mut() = kept;

        let receives: Vec<(usize, usize)> = requests
            .iter()
            .filter_map(|request| match *request {
                Request::Receive { src, tag } => Some((src, tag)),
                Request::Send { .. } => None,
            })
            .collect();

        let send_routes = sends
            .iter()
            .map(|staged| Ok((self.check_peer(staged.dest)?, wire_tags(staged.tag)?)))
            .collect::<Result<Vec<_>, TransportError>>()?;
        let receive_routes = receives
            .iter()
            .map(|&(src, tag)| Ok((self.check_peer(src)?, wire_tags(tag)?)))
            .collect::<Result<Vec<_>, TransportError>>()?;

        // Headers first: every send is posted before any blocking receive
        let mut headers: Vec<Header> = vec![[0u8; HEADER_LEN]; receives.len()];
        mpi::request::scope(|scope| {
            let posted: Vec<_> = sends
                .iter()
                .zip(&send_routes)
                .map(|(staged, &(dest, (header_tag, _)))| {
                    self.world
                        .process_at_rank(dest)
                        .immediate_send_with_tag(scope, &staged.header[..], header_tag)
                })
                .collect();
            for (header, &(src, (header_tag, _))) in headers.iter_mut().zip(&receive_routes) {
                self.world
                    .process_at_rank(src)
                    .receive_into_with_tag(&mut header[..], header_tag);
            }
            for request in posted {
                request.wait();
            }
        });

        let expected: Vec<(usize, blake3::Hash)> = headers.iter().map(decode_header).collect();
        let mut bodies: Vec<Vec<u8>> = expected.iter().map(|&(len, _)| vec![0u8; len]).collect();

        mpi::request::scope(|scope| {
            let sent: Vec<_> = sends
                .iter()
                .zip(&send_routes)
                .map(|(staged, &(dest, (_, payload_tag)))| {
                    self.world
                        .process_at_rank(dest)
                        .immediate_send_with_tag(scope, &staged.payload[..], payload_tag)
                })
                .collect();
            let received: Vec<_> = bodies
                .iter_mut()
                .zip(&receive_routes)
                .map(|(body, &(src, (_, payload_tag)))| {
                    self.world.process_at_rank(src).immediate_receive_into_with_tag(
                        scope,
                        &mut body[..],
                        payload_tag,
                    )
                })
                .collect();
            for request in sent {
                request.wait();
            }
            for request in received {
                request.wait();
            }
        });

        let mut arrived = receives.into_iter().zip(expected).zip(bodies);
        let mut completions = Vec::with_capacity(requests.len());
        for request in requests {
            let completion = match request {
                Request::Send { dest, tag } => Completion::Sent { dest, tag },
                Request::Receive { .. } => {
                    let Some((((src, tag), (_, digest)), payload)) = arrived.next() else {
                        continue;
                    };
                    if self.verify_checksums && blake3::hash(&payload) != digest {
                        return Err(TransportError::ChecksumMismatch { src, tag });
                    }
                    Completion::Received { src, tag, payload }
                }
            };
            completions.push(completion);
        }

        Ok(completions)
    }
}
