//! In-process transport: one endpoint per rank, one thread per endpoint
//!
//! Sends are buffered in the destination's unbounded inbox, so they
//! complete as soon as they are posted. Receives match on (source, tag);
//! messages that arrive for a different pair are parked until asked for.
//! A dropped endpoint tells every peer it has gone, so a receive that can
//! no longer be satisfied fails instead of blocking.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::trace;

use super::{Completion, Request, TransportChannel, TransportError};

#[derive(Debug)]
struct Envelope {
    src: usize,
    tag: usize,
    digest: blake3::Hash,
    payload: Vec<u8>,
}

#[derive(Debug)]
enum Message {
    Data(Envelope),
    Departed { src: usize },
}

/// Endpoint of an in-process process group.
#[derive(Debug)]
pub struct LocalTransport {
    rank: usize,
    size: usize,
    /// `peers[r]` feeds rank `r`'s inbox; `None` for this rank
    peers: Vec<Option<Sender<Message>>>,
    inbox: Receiver<Message>,
    unexpected: RefCell<HashMap<(usize, usize), VecDeque<Envelope>>>,
    departed: RefCell<HashSet<usize>>,
    verify_checksums: bool,
}

/// Create a fully connected group of `size` endpoints, indexed by rank.
pub fn local_cluster(size: usize, verify_checksums: bool) -> Vec<LocalTransport> {
    let (senders, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| mpsc::channel()).unzip();

    inboxes
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| LocalTransport {
            rank,
            size,
            peers: senders
                .iter()
                .enumerate()
                .map(|(peer, tx)| (peer != rank).then(|| tx.clone()))
                .collect(),
            inbox,
            unexpected: RefCell::new(HashMap::new()),
            departed: RefCell::new(HashSet::new()),
            verify_checksums,
        })
        .collect()
}

impl LocalTransport {
    fn check_peer(&self, peer: usize) -> Result<(), TransportError> {
        if peer >= self.size || peer == self.rank {
            return Err(TransportError::InvalidRank {
                rank: peer,
                size: self.size,
            });
        }
        Ok(())
    }

    fn take_matching(&self, src: usize, tag: usize) -> Result<Envelope, TransportError> {
        if let Some(envelope) = self
            .unexpected
            .borrow_mut()
            .get_mut(&(src, tag))
            .and_then(VecDeque::pop_front)
        {
            return Ok(envelope);
        }

        let disconnected = TransportError::PeerDisconnected { peer: src };
        if self.departed.borrow().contains(&src) {
            return Err(disconnected);
        }

        loop {
            let envelope = match self.inbox.recv().map_err(|_| disconnected.clone())? {
                Message::Data(envelope) => envelope,
                Message::Departed { src: peer } => {
                    trace!(rank = self.rank, peer, "peer departed");
                    self.departed.borrow_mut().insert(peer);
                    if peer == src {
                        return Err(disconnected);
                    }
                    continue;
                }
            };
            if envelope.src == src && envelope.tag == tag {
                return Ok(envelope);
            }
            self.unexpected
                .borrow_mut()
                .entry((envelope.src, envelope.tag))
                .or_default()
                .push_back(envelope);
        }
    }
}

impl TransportChannel for LocalTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, dest: usize, tag: usize, payload: Vec<u8>) -> Result<Request, TransportError> {
        self.check_peer(dest)?;
        let sender = self.peers[dest]
            .as_ref()
            .ok_or(TransportError::InvalidRank {
                rank: dest,
                size: self.size,
            })?;

        trace!(rank = self.rank, dest, tag, bytes = payload.len(), "posting send");
        let envelope = Envelope {
            src: self.rank,
            tag,
            digest: blake3::hash(&payload),
            payload,
        };
        sender
            .send(Message::Data(envelope))
            .map_err(|_| TransportError::PeerDisconnected { peer: dest })?;

        Ok(Request::Send { dest, tag })
    }

    fn irecv(&self, src: usize, tag: usize) -> Result<Request, TransportError> {
        self.check_peer(src)?;
        trace!(rank = self.rank, src, tag, "posting receive");
        Ok(Request::Receive { src, tag })
    }

    fn wait_all(&self, requests: Vec<Request>) -> Result<Vec<Completion>, TransportError> {
        let mut completions = Vec::with_capacity(requests.len());

        for request in requests {
            let completion = match request {
                Request::Send { dest, tag } => Completion::Sent { dest, tag },
                Request::Receive { src, tag } => {
                    let envelope = self.take_matching(src, tag)?;
                    if self.verify_checksums && blake3::hash(&envelope.payload) != envelope.digest {
                        return Err(TransportError::ChecksumMismatch { src, tag });
                    }
                    Completion::Received {
                        src,
                        tag,
                        payload: envelope.payload,
                    }
                }
            };
            completions.push(completion);
        }

        Ok(completions)
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        for sender in self.peers.iter().flatten() {
            // A peer that is already gone has nothing left to wait for
            let _ = sender.send(Message::Departed { src: self.rank });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_order_tags_are_matched() {
        let mut world = local_cluster(2, true);
        let b = world.pop().unwrap();
        let a = world.pop().unwrap();

        let s1 = a.isend(1, 7, b"seven".to_vec()).unwrap();
        let s2 = a.isend(1, 3, b"three".to_vec()).unwrap();
        assert_eq!(a.wait_all(vec![s1, s2]).unwrap().len(), 2);

        let r3 = b.irecv(0, 3).unwrap();
        let r7 = b.irecv(0, 7).unwrap();
        let done = b.wait_all(vec![r3, r7]).unwrap();
        assert_eq!(
            done,
            vec![
                Completion::Received { src: 0, tag: 3, payload: b"three".to_vec() },
                Completion::Received { src: 0, tag: 7, payload: b"seven".to_vec() },
            ]
        );
    }

    #[test]
    fn test_self_and_out_of_range_rejected() {
        let world = local_cluster(2, false);
        assert!(matches!(
            world[0].isend(0, 0, Vec::new()),
            Err(TransportError::InvalidRank { rank: 0, size: 2 })
        ));
        assert!(matches!(
            world[0].irecv(5, 0),
            Err(TransportError::InvalidRank { rank: 5, size: 2 })
        ));
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let world = local_cluster(2, true);
        let forged = Envelope {
            src: 1,
            tag: 4,
            digest: blake3::hash(b"original"),
            payload: b"tampered".to_vec(),
        };
        world[1].peers[0]
            .as_ref()
            .unwrap()
            .send(Message::Data(forged))
            .unwrap();

        let request = world[0].irecv(1, 4).unwrap();
        assert!(matches!(
            world[0].wait_all(vec![request]),
            Err(TransportError::ChecksumMismatch { src: 1, tag: 4 })
        ));
    }

    #[test]
    fn test_receive_from_departed_peer_fails() {
        let mut world = local_cluster(2, false);
        let a = world.remove(0);
        drop(world);

        let request = a.irecv(1, 0).unwrap();
        assert!(matches!(
            a.wait_all(vec![request]),
            Err(TransportError::PeerDisconnected { peer: 1 })
        ));
    }

    #[test]
    fn test_departure_noticed_while_other_peers_remain() {
        let mut world = local_cluster(4, false);
        let gone = world.remove(3);
        gone.isend(0, 1, b"last words".to_vec()).unwrap();
        drop(gone);

        let a = &world[0];
        let delivered = a.irecv(3, 1).unwrap();
        assert_eq!(a.wait_all(vec![delivered]).unwrap().len(), 1);

        let never = a.irecv(3, 2).unwrap();
        assert!(matches!(
            a.wait_all(vec![never]),
            Err(TransportError::PeerDisconnected { peer: 3 })
        ));
    }
}
