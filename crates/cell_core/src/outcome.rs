//! Match outcome evaluation.

use crate::history::build_history;
use crate::{
    push_event, Color, Event, EventEnvelope, MatchContent, MatchOutcome, MatchState, OutcomeKind,
};

/// Returns the match outcome if the match is over, without mutating anything.
///
/// Once an outcome is recorded the same outcome is returned forever.
/// Elimination is checked before the clock, so a capture landing on the
/// final second still counts as a win by elimination.
pub fn evaluate_outcome(state: &MatchState, content: &MatchContent) -> Option<MatchOutcome> {
    if let Some(outcome) = &state.outcome {
        return Some(outcome.clone());
    }

    let kind = elimination(state).or_else(|| {
        (state.round.seconds_left == 0).then_some(OutcomeKind::Timeout {
            favored: content.constants.timeout_favors,
        })
    })?;
    let (title, message) = notification(kind, state.setup.perspective);
    Some(MatchOutcome {
        kind,
        title,
        message,
        ended_ms: state.meta.now_ms,
    })
}

fn elimination(state: &MatchState) -> Option<OutcomeKind> {
    let owns_nodes = |color: Color| state.nodes.iter().any(|node| node.color == color);
    let loser = state
        .setup
        .players
        .iter()
        .copied()
        .find(|&color| !owns_nodes(color))?;
    let winner = state
        .setup
        .players
        .iter()
        .copied()
        .find(|&color| color != loser && owns_nodes(color))
        .unwrap_or_else(|| loser.opponent());
    Some(OutcomeKind::Elimination { winner, loser })
}

fn notification(kind: OutcomeKind, perspective: Option<Color>) -> (String, String) {
    match (kind, perspective) {
        (OutcomeKind::Elimination { winner, .. }, Some(side)) if side == winner => (
            "Victory".to_string(),
            "You defeated every opponent!".to_string(),
        ),
        (OutcomeKind::Elimination { .. }, Some(_)) => (
            "Defeat".to_string(),
            "Your units were defeated.".to_string(),
        ),
        (OutcomeKind::Elimination { winner, loser }, None) => (
            format!("{winner} wins"),
            format!("{loser} has no nodes left."),
        ),
        (OutcomeKind::Timeout { favored }, Some(side)) => {
            let title = if side == favored { "Victory" } else { "Defeat" };
            (title.to_string(), "Time ran out!".to_string())
        }
        (OutcomeKind::Timeout { favored }, None) => {
            (format!("{favored} wins"), "Time ran out!".to_string())
        }
    }
}

/// Ends the match if it is over: stops the scheduler, closes the arbiter and
/// emits the single `MatchEnded` event carrying the history record.
/// Returns `true` once the match has ended.
pub(crate) fn conclude_if_over(
    state: &mut MatchState,
    content: &MatchContent,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    if state.outcome.is_some() {
        return true;
    }
    let Some(outcome) = evaluate_outcome(state, content) else {
        return false;
    };
    state.scheduler.stop();
    state.turn.end();
    state.units.clear();
    let history = build_history(state);
    state.outcome = Some(outcome.clone());
    push_event(state, events, Event::MatchEnded { outcome, history });
    true
}
