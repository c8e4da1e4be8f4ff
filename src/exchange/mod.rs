//! Hypercube all-reduce of reference partitions
//!
//! After `log2(P)` rounds every rank holds one table per rank: its own,
//! borrowed, plus a freshly materialised copy of every peer's partition.
//! Round r pairs each rank with the reflection of its offset inside a
//! group of 2^r ranks and swaps 2^(r-1) slots each way, so the populated
//! slot count doubles every round.
//!
//! Within a round all sends and receives are posted before a single
//! `wait_all`; round r+1 is never started before that returns. There is no
//! retry and no timeout: any transport, allocation, or decoding failure
//! aborts the exchange.

mod events;
mod schedule;
mod slots;

pub use events::{ExchangeEvent, ExchangeObserver, NoopObserver, RecordingObserver, TracingObserver};
pub use schedule::{HypercubeSchedule, RoundPlan};
pub use slots::RemoteTables;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::arena::RemoteTableArena;
use crate::transport::{Completion, TransportChannel};
use crate::{GnpError, Result};

/// Drives the round-based pairwise exchange for one rank.
pub struct HypercubeExchanger<'a, C, A> {
    transport: &'a C,
    arena: &'a A,
    observer: &'a dyn ExchangeObserver,
}

impl<C, A> fmt::Debug for HypercubeExchanger<'_, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HypercubeExchanger").finish_non_exhaustive()
    }
}

impl<'a, C: TransportChannel, A> HypercubeExchanger<'a, C, A> {
    /// Exchanger over `transport`, allocating receive targets from `arena`.
    pub fn new(transport: &'a C, arena: &'a A) -> Self {
        Self {
            transport,
            arena,
            observer: &NoopObserver,
        }
    }

    /// Report progress to `observer`.
    pub fn with_observer(mut self, observer: &'a dyn ExchangeObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Give every rank a table per rank.
    ///
    /// `local` ends up in its own rank's slot by reference. Each received
    /// table is allocated in the arena before its receive is posted, then
    /// the payload is decoded into it. Tables travel in bincode's fixed-width
    /// encoding, which keeps every `f64` bit pattern (infinities and NaN
    /// included) and places no limit on tree depth.
    ///
    /// On error, tables already allocated are returned to the arena when
    /// the partially filled array drops. Transfers the peer already posted
    /// are not drained.
    pub fn all_reduce<'t, T>(&self, local: &'t T) -> Result<RemoteTables<'t, T, A>>
    where
        'a: 't,
        T: Serialize + DeserializeOwned,
        A: RemoteTableArena<T>,
    {
        let rank = self.transport.rank();
        let size = self.transport.size();
        let schedule = HypercubeSchedule::new(rank, size)?;

        let mut tables = RemoteTables::new(size, rank, local, self.arena);

        for plan in schedule.rounds() {
            self.observer.on_event(&ExchangeEvent::RoundStarted(plan));

            let mut requests = Vec::with_capacity(2 * plan.num_tables_in_action);
            for (send_id, receive_id) in plan.send_ids().zip(plan.receive_ids()) {
                tables.install_pending(receive_id, self.arena.construct()?);

                let outgoing = tables.get(send_id).ok_or(GnpError::SlotUnavailable {
                    slot: send_id,
                    round: plan.round,
                })?;
                let payload = encode_table(outgoing)?;
                requests.push(self.transport.isend(plan.partner, send_id, payload)?);
                self.observer.on_event(&ExchangeEvent::TableSent {
                    round: plan.round,
                    from: rank,
                    to: plan.partner,
                    slot: send_id,
                });

                requests.push(self.transport.irecv(plan.partner, receive_id)?);
            }

            for completion in self.transport.wait_all(requests)? {
                let Completion::Received { src, tag, payload } = completion else {
                    continue;
                };
                let target = tables.pending_mut(tag).ok_or(GnpError::SlotUnavailable {
                    slot: tag,
                    round: plan.round,
                })?;
                *target = decode_table(&payload)?;
                tables.mark_received(tag);
                self.observer.on_event(&ExchangeEvent::TableReceived {
                    round: plan.round,
                    from: src,
                    to: rank,
                    slot: tag,
                });
            }

            debug_assert_eq!(tables.populated(), plan.stride);
            self.observer.on_event(&ExchangeEvent::RoundCompleted {
                round: plan.round,
                populated: tables.populated(),
            });
        }

        Ok(tables)
    }

    /// Return every non-owned table to the arena.
    pub fn release<T>(&self, tables: RemoteTables<'_, T, A>) -> usize
    where
        A: RemoteTableArena<T>,
    {
        let count = tables.release();
        self.observer.on_event(&ExchangeEvent::TablesReleased {
            rank: self.transport.rank(),
            count,
        });
        count
    }
}

fn encode_table<T: Serialize>(table: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(table)?)
}

fn decode_table<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(payload)?)
}
