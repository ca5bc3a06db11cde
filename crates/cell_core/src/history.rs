//! Minimal move log needed to reconstruct a match.

use crate::geometry::integer_position;
use crate::{HistoryEvent, MatchHistory, MatchState, MoveKind, NodeId, NodeSnapshot, Origin};

/// Logs an accepted connect. Classified against the target's color at the
/// moment the move was made.
pub(crate) fn record_move(state: &mut MatchState, from: NodeId, to: NodeId, by: Origin) {
    let (Some(source), Some(target)) = (state.nodes.get(from.0), state.nodes.get(to.0)) else {
        return;
    };
    let kind = if source.color == target.color {
        MoveKind::Support
    } else {
        MoveKind::Attack
    };
    let time = state.round.elapsed_seconds();
    state.history.push(HistoryEvent {
        kind,
        from,
        to,
        by,
        time,
    });
}

pub fn snapshot_nodes(state: &MatchState) -> Vec<NodeSnapshot> {
    state
        .nodes
        .iter()
        .map(|node| {
            let [x, y] = integer_position(node.position);
            NodeSnapshot {
                x,
                y,
                color: node.color,
                units: node.units,
                node_type: node.node_type,
            }
        })
        .collect()
}

pub(crate) fn build_history(state: &MatchState) -> MatchHistory {
    MatchHistory {
        match_id: state.meta.match_id.clone(),
        level: state.meta.level.clone(),
        duration: state.round.elapsed_seconds(),
        nodes: snapshot_nodes(state),
        events: state.history.clone(),
    }
}
