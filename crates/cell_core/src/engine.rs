use crate::connection::{
    cancel_connection, emit_unit, find_connection, open_connection, validate_connect,
};
use crate::history::record_move;
use crate::outcome::conclude_if_over;
use crate::placement::place_node;
use crate::protocol::{resolve_move, MoveAction, MovePayload};
use crate::scheduler::Timer;
use crate::transit::advance_units;
use crate::turn::{arm_turn_timer, begin_turns, finish_turn, on_turn_timeout};
use crate::{
    push_event, ArbiterMode, Color, Command, CommandEnvelope, ConnectionId, Event, EventEnvelope,
    EventLevel, MatchContent, MatchState, NodeId, Origin, RejectReason, TurnPhase,
};

const ROUND_CLOCK_PERIOD_MS: u64 = 1000;

/// Advance the match by one tick of `constants.tick_ms` simulated milliseconds.
///
/// Order of operations:
/// 1. On the first call, arm every periodic timer and announce the first turn.
/// 2. Apply commands in the order given. A gated turn that saw a move
///    passes to the next player once the batch is done.
/// 3. Fire every timer due before the end of the tick, in fire-time order.
///    The outcome is re-evaluated after each one.
/// 4. Evaluate the outcome, advance the clock and increment the tick counter.
///
/// Once the match has ended this is a no-op returning no events.
pub fn tick(
    state: &mut MatchState,
    commands: &[CommandEnvelope],
    content: &MatchContent,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    if state.outcome.is_some() {
        return events;
    }

    if !state.meta.started {
        start_match(state, content, &mut events);
    }
    apply_commands(state, commands, content, event_level, &mut events);

    let until = state.meta.now_ms + content.constants.tick_ms;
    if !conclude_if_over(state, content, &mut events) {
        run_timers(state, content, until, event_level, &mut events);
    }
    if !conclude_if_over(state, content, &mut events) {
        state.meta.now_ms = until;
    }

    state.meta.tick += 1;
    events
}

fn start_match(state: &mut MatchState, content: &MatchContent, events: &mut Vec<EventEnvelope>) {
    let constants = &content.constants;
    let now = state.meta.now_ms;
    state.meta.started = true;

    for index in 0..state.nodes.len() {
        let interval = state.nodes[index]
            .node_type
            .production_interval_ms(&constants.production);
        state
            .scheduler
            .schedule(now + interval, Timer::Production(NodeId(index)));
    }
    state
        .scheduler
        .schedule(now + constants.movement_interval_ms, Timer::Movement);
    state
        .scheduler
        .schedule(now + ROUND_CLOCK_PERIOD_MS, Timer::RoundClock);
    for &color in &state.setup.ai_colors {
        state
            .scheduler
            .schedule(now + constants.ai_interval_ms, Timer::PlannerWake(color));
    }

    let (level, mode) = (state.meta.level.clone(), state.setup.mode);
    push_event(state, events, Event::MatchStarted { level, mode });
    begin_turns(state, constants, events);
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn apply_commands(
    state: &mut MatchState,
    commands: &[CommandEnvelope],
    content: &MatchContent,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    for envelope in commands {
        let result = match &envelope.command {
            Command::Connect { from, to } => {
                apply_connect(state, content, envelope, *from, *to, events)
            }
            Command::Cancel { connection } => apply_cancel(state, envelope, *connection, events),
            Command::PlaceNode {
                position,
                node_type,
            } => place_node(
                state,
                &content.constants,
                envelope.issued_by,
                *position,
                *node_type,
                events,
            )
            .map(|_| ()),
            Command::RemoteMove { payload } => {
                apply_remote_move(state, content, payload, event_level, events)
            }
            Command::TransportLost => apply_transport_lost(state, content, events),
        };

        if let Err(reason) = result {
            if event_level == EventLevel::Debug {
                push_event(
                    state,
                    events,
                    Event::MoveRejected {
                        issued_by: envelope.issued_by,
                        reason,
                    },
                );
            }
        }
    }

    // The turn closes only after the whole batch; later moves in it see
    // `move_made`.
    if state.turn.move_made {
        finish_turn(state, &content.constants, events);
    }
}

/// A locally issued move in networked play must come from this machine's side.
fn check_local_side(state: &MatchState, envelope: &CommandEnvelope) -> Result<(), RejectReason> {
    match state.turn.mode {
        ArbiterMode::NetworkedAlternating { local }
            if envelope.origin != Origin::Network && envelope.issued_by != local =>
        {
            Err(RejectReason::NotYourTurn)
        }
        _ => Ok(()),
    }
}

fn is_networked(state: &MatchState) -> bool {
    matches!(state.turn.mode, ArbiterMode::NetworkedAlternating { .. })
}

fn apply_connect(
    state: &mut MatchState,
    content: &MatchContent,
    envelope: &CommandEnvelope,
    from: NodeId,
    to: NodeId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    check_local_side(state, envelope)?;
    state.turn.authorize(envelope.issued_by)?;
    validate_connect(state, from, to, envelope.issued_by)?;

    record_move(state, from, to, envelope.origin);
    open_connection(state, &content.constants, from, to, events);
    if is_networked(state) {
        let payload = MovePayload::between(state, MoveAction::Connect, from, to).encode();
        push_event(state, events, Event::OutboundMove { payload });
    }
    if state.turn.is_gated() {
        state.turn.move_made = true;
    }
    Ok(())
}

/// Cancels are never turn-gated; the peer mirrors them on receipt.
fn apply_cancel(
    state: &mut MatchState,
    envelope: &CommandEnvelope,
    connection: ConnectionId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    check_local_side(state, envelope)?;
    let endpoints = state
        .connections
        .get(&connection)
        .map(|c| (c.source, c.target));
    cancel_connection(state, connection, envelope.issued_by, events)?;

    if let (true, Some((from, to))) = (is_networked(state), endpoints) {
        let payload = MovePayload::between(state, MoveAction::Cancel, from, to).encode();
        push_event(state, events, Event::OutboundMove { payload });
    }
    Ok(())
}

fn apply_remote_move(
    state: &mut MatchState,
    content: &MatchContent,
    payload: &[u8],
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    let ArbiterMode::NetworkedAlternating { local } = state.turn.mode else {
        return Err(RejectReason::WrongMode);
    };
    let remote = local.opponent();
    let remote_turn = state.turn.phase == TurnPhase::WaitingForRemoteMove;

    let decoded = match MovePayload::decode(payload) {
        Ok(decoded) => decoded,
        Err(err) => {
            // Recoverable: report it and keep the match moving.
            let reason = err.to_string();
            push_event(state, events, Event::RemotePayloadRejected { reason });
            if remote_turn {
                state.turn.move_made = true;
            }
            return Ok(());
        }
    };

    match decoded.action {
        MoveAction::Cancel => {
            let (from, to) = resolve_move(state, &decoded).ok_or(RejectReason::UnknownNode)?;
            let connection =
                find_connection(state, from, to, remote).ok_or(RejectReason::UnknownConnection)?;
            cancel_connection(state, connection, remote, events)
        }
        _ if !remote_turn => Err(RejectReason::NotYourTurn),
        _ if state.turn.move_made => Err(RejectReason::MoveAlreadyMade),
        MoveAction::Pass => {
            state.turn.move_made = true;
            Ok(())
        }
        MoveAction::Connect => {
            let result = apply_remote_connect(state, content, &decoded, remote, events);
            state.turn.move_made = true;
            if let Err(reason) = result {
                if event_level == EventLevel::Debug {
                    push_event(
                        state,
                        events,
                        Event::MoveRejected {
                            issued_by: remote,
                            reason,
                        },
                    );
                }
            }
            Ok(())
        }
    }
}

fn apply_remote_connect(
    state: &mut MatchState,
    content: &MatchContent,
    payload: &MovePayload,
    remote: Color,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    let Some((from, to)) = resolve_move(state, payload) else {
        let reason = "move endpoints do not match any node".to_string();
        push_event(state, events, Event::RemotePayloadRejected { reason });
        return Ok(());
    };
    validate_connect(state, from, to, remote)?;
    record_move(state, from, to, Origin::Network);
    open_connection(state, &content.constants, from, to, events);
    Ok(())
}

fn apply_transport_lost(
    state: &mut MatchState,
    content: &MatchContent,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    if !state.turn.degrade_to_local() {
        return Err(RejectReason::WrongMode);
    }
    push_event(state, events, Event::NetworkDegraded);
    arm_turn_timer(state, &content.constants);
    Ok(())
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

fn run_timers(
    state: &mut MatchState,
    content: &MatchContent,
    until: u64,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    while let Some(due) = state.scheduler.pop_due(until) {
        state.meta.now_ms = state.meta.now_ms.max(due.at_ms);
        fire_timer(state, content, due.at_ms, due.timer, event_level, events);
        if conclude_if_over(state, content, events) {
            return;
        }
    }
}

fn fire_timer(
    state: &mut MatchState,
    content: &MatchContent,
    at_ms: u64,
    timer: Timer,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let constants = &content.constants;
    match timer {
        Timer::Movement => {
            advance_units(state, constants, constants.movement_interval_ms, events);
            state
                .scheduler
                .schedule(at_ms + constants.movement_interval_ms, timer);
        }
        Timer::RoundClock => {
            state.round.seconds_left = state.round.seconds_left.saturating_sub(1);
            let seconds_left = state.round.seconds_left;
            if event_level == EventLevel::Debug {
                push_event(state, events, Event::RoundClockTick { seconds_left });
            }
            if seconds_left > 0 {
                state.scheduler.schedule(at_ms + ROUND_CLOCK_PERIOD_MS, timer);
            }
        }
        Timer::Production(node) => {
            let Some(target) = state.nodes.get_mut(node.0) else {
                return;
            };
            let produced = target.produce_unit(constants.max_units);
            let (units, interval) = (
                target.units,
                target.node_type.production_interval_ms(&constants.production),
            );
            if produced && event_level == EventLevel::Debug {
                push_event(state, events, Event::UnitProduced { node, units });
            }
            state.scheduler.schedule(at_ms + interval, timer);
        }
        Timer::ConnectionEmit(connection) => {
            // A cancelled or invalidated connection simply stops re-arming.
            if state.connections.contains_key(&connection) {
                emit_unit(state, constants, connection, event_level, events);
                state
                    .scheduler
                    .schedule(at_ms + constants.connection_emit_interval_ms, timer);
            }
        }
        Timer::TurnTimeout { turn_number } => {
            on_turn_timeout(state, constants, turn_number, events);
        }
        Timer::PlannerWake(color) => {
            push_event(state, events, Event::PlannerWake { color });
            state
                .scheduler
                .schedule(at_ms + constants.ai_interval_ms, timer);
        }
    }
}
