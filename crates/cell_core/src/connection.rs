//! Connection lifecycle: open, emit, cancel, invalidate.
//!
//! A connection is active while it is present in `MatchState::connections`.
//! Cancel and capture-invalidation both remove it; there is no way back.

use smallvec::SmallVec;

use crate::scheduler::Timer;
use crate::{
    push_event, Color, ConnectionId, ConnectionState, Constants, Event, EventEnvelope, EventLevel,
    MatchState, NodeId, RejectReason, TransitUnit, UnitId,
};

/// Checks everything about a connect action except turn gating.
pub(crate) fn validate_connect(
    state: &MatchState,
    from: NodeId,
    to: NodeId,
    issued_by: Color,
) -> Result<(), RejectReason> {
    let (Some(source), Some(target)) = (state.nodes.get(from.0), state.nodes.get(to.0)) else {
        return Err(RejectReason::UnknownNode);
    };
    if from == to {
        return Err(RejectReason::SelfTarget);
    }
    if source.color != issued_by {
        return Err(RejectReason::NotOwner);
    }
    if !source.can_connect() || !target.can_connect() {
        return Err(RejectReason::CapacityExceeded);
    }
    Ok(())
}

/// Opens a validated connection and arms its emission timer.
pub(crate) fn open_connection(
    state: &mut MatchState,
    constants: &Constants,
    from: NodeId,
    to: NodeId,
    events: &mut Vec<EventEnvelope>,
) -> ConnectionId {
    let id = ConnectionId(state.counters.next_connection_id);
    state.counters.next_connection_id += 1;

    let source = &mut state.nodes[from.0];
    source.register_connection();
    let owner = source.color;

    state.connections.insert(
        id,
        ConnectionState {
            id,
            source: from,
            target: to,
            owner,
            opened_ms: state.meta.now_ms,
        },
    );
    let first_emit = state.meta.now_ms + constants.connection_emit_interval_ms;
    state.scheduler.schedule(first_emit, Timer::ConnectionEmit(id));

    push_event(
        state,
        events,
        Event::ConnectionOpened {
            connection: id,
            from,
            to,
            owner,
        },
    );
    id
}

/// Emission timer body. Returns the spawned unit, or `None` when the source
/// is empty or the connection no longer exists.
pub(crate) fn emit_unit(
    state: &mut MatchState,
    constants: &Constants,
    connection: ConnectionId,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) -> Option<UnitId> {
    let conn = state.connections.get(&connection)?;
    let (from, to) = (conn.source, conn.target);

    let destination = state.nodes[to.0].position;
    let source = &mut state.nodes[from.0];
    if source.units == 0 {
        return None;
    }
    source.decrease_unit(1);
    let (position, source_color, source_type) = (source.position, source.color, source.node_type);

    let id = UnitId(state.counters.next_unit_id);
    state.counters.next_unit_id += 1;
    #[allow(clippy::cast_precision_loss)]
    let speed = constants.unit_speed / constants.movement_interval_ms.max(1) as f32;
    state.units.insert(
        id,
        TransitUnit {
            id,
            source: from,
            target: to,
            position,
            destination,
            source_color,
            source_type,
            speed,
        },
    );

    if event_level == EventLevel::Debug {
        push_event(
            state,
            events,
            Event::UnitDispatched {
                unit: id,
                connection,
            },
        );
    }
    Some(id)
}

/// Owner-only cancel. Frees one slot on the source node.
pub(crate) fn cancel_connection(
    state: &mut MatchState,
    connection: ConnectionId,
    issued_by: Color,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    let conn = state
        .connections
        .get(&connection)
        .ok_or(RejectReason::UnknownConnection)?;
    if conn.owner != issued_by {
        return Err(RejectReason::NotOwner);
    }
    let source = conn.source;
    state.connections.remove(&connection);
    state.nodes[source.0].unregister_connection();
    push_event(state, events, Event::ConnectionCancelled { connection });
    Ok(())
}

/// First active connection `owner` has from `from` to `to`, if any.
pub(crate) fn find_connection(
    state: &MatchState,
    from: NodeId,
    to: NodeId,
    owner: Color,
) -> Option<ConnectionId> {
    state
        .connections
        .values()
        .find(|c| c.source == from && c.target == to && c.owner == owner)
        .map(|c| c.id)
}

/// Removes every connection touching `captured`, whatever its owner.
///
/// The captured node's own counter was already reset by `apply_capture`;
/// any other source node gets its slot back.
pub(crate) fn invalidate_touching(
    state: &mut MatchState,
    captured: NodeId,
    events: &mut Vec<EventEnvelope>,
) {
    let doomed: SmallVec<[(ConnectionId, NodeId); 8]> = state
        .connections
        .values()
        .filter(|c| c.source == captured || c.target == captured)
        .map(|c| (c.id, c.source))
        .collect();

    for (connection, source) in doomed {
        state.connections.remove(&connection);
        if source != captured {
            state.nodes[source.0].unregister_connection();
        }
        push_event(
            state,
            events,
            Event::ConnectionInvalidated {
                connection,
                captured,
            },
        );
    }
}
