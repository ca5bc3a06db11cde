//! Turn arbiter: decides whose move is accepted and when the turn advances.

use crate::protocol::MovePayload;
use crate::scheduler::Timer;
use crate::{
    push_event, ArbiterMode, Color, Constants, Event, EventEnvelope, MatchMode, MatchState,
    RejectReason, TurnPhase, TurnState,
};

impl ArbiterMode {
    pub fn from_match_mode(mode: MatchMode) -> Self {
        match mode {
            MatchMode::Single => ArbiterMode::Free,
            MatchMode::LocalTwoPlayer => ArbiterMode::LocalAlternating,
            MatchMode::Networked { local } => ArbiterMode::NetworkedAlternating { local },
        }
    }
}

impl TurnState {
    pub fn new(mode: ArbiterMode, players: Vec<Color>) -> Self {
        let mut turn = Self {
            mode,
            players,
            current_index: 0,
            turn_number: 1,
            move_made: false,
            phase: TurnPhase::WaitingForLocalMove,
        };
        turn.phase = turn.waiting_phase();
        turn
    }

    pub fn current_player(&self) -> Option<Color> {
        self.players.get(self.current_index).copied()
    }

    pub fn is_gated(&self) -> bool {
        self.mode != ArbiterMode::Free
    }

    pub fn is_ended(&self) -> bool {
        self.phase == TurnPhase::MatchEnded
    }

    /// The turn timer only runs while this machine owes a move.
    pub fn requires_local_timer(&self) -> bool {
        if self.is_ended() {
            return false;
        }
        match self.mode {
            ArbiterMode::Free => false,
            ArbiterMode::LocalAlternating => true,
            ArbiterMode::NetworkedAlternating { local } => self.current_player() == Some(local),
        }
    }

    pub fn authorize(&self, color: Color) -> Result<(), RejectReason> {
        if self.is_ended() {
            return Err(RejectReason::MatchOver);
        }
        if self.mode == ArbiterMode::Free {
            return Ok(());
        }
        if self.current_player() != Some(color) {
            return Err(RejectReason::NotYourTurn);
        }
        if self.move_made {
            return Err(RejectReason::MoveAlreadyMade);
        }
        Ok(())
    }

    /// Moves to the next player. Returns the new `(current_color, turn_number)`.
    pub fn advance(&mut self) -> Option<(Color, u64)> {
        if self.players.is_empty() || self.is_ended() {
            return None;
        }
        self.current_index = (self.current_index + 1) % self.players.len();
        self.turn_number += 1;
        self.move_made = false;
        self.phase = self.waiting_phase();
        self.current_player().map(|color| (color, self.turn_number))
    }

    pub fn end(&mut self) {
        self.phase = TurnPhase::MatchEnded;
    }

    /// Transport lost: the peer's side is now played on this machine.
    pub fn degrade_to_local(&mut self) -> bool {
        if !matches!(self.mode, ArbiterMode::NetworkedAlternating { .. }) {
            return false;
        }
        self.mode = ArbiterMode::LocalAlternating;
        if !self.is_ended() {
            self.phase = TurnPhase::WaitingForLocalMove;
        }
        true
    }

    fn waiting_phase(&self) -> TurnPhase {
        match self.mode {
            ArbiterMode::NetworkedAlternating { local } if self.current_player() != Some(local) => {
                TurnPhase::WaitingForRemoteMove
            }
            _ => TurnPhase::WaitingForLocalMove,
        }
    }
}

/// Announces the first turn and arms its timer.
pub(crate) fn begin_turns(
    state: &mut MatchState,
    constants: &Constants,
    events: &mut Vec<EventEnvelope>,
) {
    if !state.turn.is_gated() {
        return;
    }
    arm_turn_timer(state, constants);
    if let Some(color) = state.turn.current_player() {
        let turn_number = state.turn.turn_number;
        push_event(state, events, Event::TurnChanged { color, turn_number });
    }
}

/// Hands the turn to the next player. Called once the current turn's move
/// batch has been applied, or when the turn times out.
pub(crate) fn finish_turn(
    state: &mut MatchState,
    constants: &Constants,
    events: &mut Vec<EventEnvelope>,
) {
    let Some((color, turn_number)) = state.turn.advance() else {
        return;
    };
    arm_turn_timer(state, constants);
    push_event(state, events, Event::TurnChanged { color, turn_number });
}

pub(crate) fn arm_turn_timer(state: &mut MatchState, constants: &Constants) {
    if state.turn.requires_local_timer() {
        let at = state.meta.now_ms + constants.turn_duration_ms;
        let turn_number = state.turn.turn_number;
        state.scheduler.schedule(at, Timer::TurnTimeout { turn_number });
    }
}

/// Timer body. Stale stamps (the turn already advanced) are ignored.
pub(crate) fn on_turn_timeout(
    state: &mut MatchState,
    constants: &Constants,
    turn_number: u64,
    events: &mut Vec<EventEnvelope>,
) {
    if turn_number != state.turn.turn_number || !state.turn.requires_local_timer() {
        return;
    }
    if matches!(state.turn.mode, ArbiterMode::NetworkedAlternating { .. }) {
        push_event(
            state,
            events,
            Event::OutboundMove {
                payload: MovePayload::pass().encode(),
            },
        );
    }
    finish_turn(state, constants, events);
}
