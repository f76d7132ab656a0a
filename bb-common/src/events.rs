//! Battle events and the in-process event bus
//!
//! Events are broadcast on an [`EventBus`] and serialized for SSE. Standings
//! updates always carry the complete ordered list: clients replace what they
//! display and redraw, never patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::ContestStatus;
use crate::ranking::Standing;

/// Battle event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BattleEvent {
    /// Placements of a contest changed (reorder, disqualify, requalify)
    ///
    /// Triggers:
    /// - SSE: Replace the displayed standings table
    StandingsReplaced {
        battle_id: i64,
        /// Ranked entries in placement order, then disqualified entries
        standings: Vec<Standing>,
        timestamp: DateTime<Utc>,
    },

    /// Contest moved to another phase
    ///
    /// Triggers:
    /// - SSE: Switch the page between submission, voting and results views
    ContestStatusChanged {
        battle_id: i64,
        old_status: ContestStatus,
        new_status: ContestStatus,
        timestamp: DateTime<Utc>,
    },
}

impl BattleEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            BattleEvent::StandingsReplaced { .. } => "StandingsReplaced",
            BattleEvent::ContestStatusChanged { .. } => "ContestStatusChanged",
        }
    }

    pub fn battle_id(&self) -> i64 {
        match self {
            BattleEvent::StandingsReplaced { battle_id, .. }
            | BattleEvent::ContestStatusChanged { battle_id, .. } => *battle_id,
        }
    }

    pub fn standings_replaced(battle_id: i64, standings: Vec<Standing>) -> Self {
        BattleEvent::StandingsReplaced {
            battle_id,
            standings,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus for [`BattleEvent`]s
///
/// Built on `tokio::sync::broadcast`: subscribers only see events emitted after
/// they subscribe, and a slow subscriber loses the oldest events once
/// `capacity` is exceeded.
pub struct EventBus {
    tx: broadcast::Sender<BattleEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BattleEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: BattleEvent) -> Result<usize, broadcast::error::SendError<BattleEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: BattleEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
