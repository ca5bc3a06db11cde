//! `cell_core`: deterministic match simulation.
//!
//! No IO, no network, no threads. Every mutation of nodes, connections and
//! turn state happens inside [`tick`], driven by one discrete-event scheduler.

mod connection;
mod engine;
mod geometry;
mod history;
mod id;
pub mod metrics;
mod node;
mod outcome;
mod placement;
pub mod protocol;
mod scheduler;
mod transit;
mod turn;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use engine::tick;
pub use geometry::{integer_position, manhattan_distance, node_at_position};
pub use history::snapshot_nodes;
pub use id::generate_uuid;
pub use metrics::{compute_metrics, MatchMetrics};
pub use outcome::evaluate_outcome;
pub use protocol::{resolve_move, MoveAction, MovePayload, ProtocolError};
pub use scheduler::{ScheduledTimer, Scheduler, Timer};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, tick: u64, at_ms: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope {
        id,
        tick,
        at_ms,
        event,
    }
}

/// Pushes an event stamped with the state's current tick and clock.
pub(crate) fn push_event(state: &mut MatchState, events: &mut Vec<EventEnvelope>, event: Event) {
    let (tick, at_ms) = (state.meta.tick, state.meta.now_ms);
    events.push(emit(&mut state.counters, tick, at_ms, event));
}

#[cfg(test)]
mod tests;
