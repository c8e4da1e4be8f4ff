//! Structured exchange events and their observers

use std::sync::Mutex;

use tracing::{debug, info};

use super::RoundPlan;

/// Something that happened during an all-reduce, from one rank's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeEvent {
    /// A round's transfers are about to be posted.
    RoundStarted(RoundPlan),
    /// A send of slot `slot` was posted.
    TableSent {
        /// Round number.
        round: u32,
        /// Sending rank.
        from: usize,
        /// Receiving rank.
        to: usize,
        /// Slot (rank) id of the table.
        slot: usize,
    },
    /// Slot `slot` arrived and was decoded.
    TableReceived {
        /// Round number.
        round: u32,
        /// Sending rank.
        from: usize,
        /// Receiving rank.
        to: usize,
        /// Slot (rank) id of the table.
        slot: usize,
    },
    /// Every transfer of the round completed locally.
    RoundCompleted {
        /// Round number.
        round: u32,
        /// Slots populated after the round.
        populated: usize,
    },
    /// Remote tables were returned to the arena.
    TablesReleased {
        /// Rank that released them.
        rank: usize,
        /// Number of tables destroyed.
        count: usize,
    },
}

/// Receiver of exchange events. Must not block.
pub trait ExchangeObserver {
    /// Handle one event.
    fn on_event(&self, event: &ExchangeEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExchangeObserver for NoopObserver {
    fn on_event(&self, _event: &ExchangeEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExchangeObserver for TracingObserver {
    fn on_event(&self, event: &ExchangeEvent) {
        match event {
            ExchangeEvent::RoundStarted(plan) => debug!(
                round = plan.round,
                rank = plan.rank,
                peer = plan.partner,
                group_leader = plan.group_leader,
                group_end = plan.group_end,
                num_tables = plan.num_tables_in_action,
                "round started"
            ),
            ExchangeEvent::TableSent { round, from, to, slot } => {
                debug!(round, rank = from, peer = to, slot, "table sent")
            }
            ExchangeEvent::TableReceived { round, from, to, slot } => {
                debug!(round, rank = to, peer = from, slot, "table received")
            }
            ExchangeEvent::RoundCompleted { round, populated } => {
                debug!(round, populated, "round completed")
            }
            ExchangeEvent::TablesReleased { rank, count } => {
                info!(rank, count, "remote tables released")
            }
        }
    }
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ExchangeEvent>>,
}

impl RecordingObserver {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events seen so far.
    pub fn events(&self) -> Vec<ExchangeEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Number of rounds that completed.
    pub fn rounds_completed(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, ExchangeEvent::RoundCompleted { .. }))
            .count()
    }
}

impl ExchangeObserver for RecordingObserver {
    fn on_event(&self, event: &ExchangeEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}
