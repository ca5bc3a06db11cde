//! One-time node placement.

use crate::geometry::manhattan_distance;
use crate::scheduler::Timer;
use crate::{
    push_event, ArbiterMode, Color, Constants, Event, EventEnvelope, MatchState, NodeId,
    NodeState, NodeType, Position, RejectReason,
};

/// Places a new node for `color`. Each side gets one placement per match;
/// it is unavailable in networked play and does not consume a turn.
pub(crate) fn place_node(
    state: &mut MatchState,
    constants: &Constants,
    color: Color,
    position: Position,
    node_type: NodeType,
    events: &mut Vec<EventEnvelope>,
) -> Result<NodeId, RejectReason> {
    if state.turn.is_ended() {
        return Err(RejectReason::MatchOver);
    }
    match state.turn.mode {
        ArbiterMode::NetworkedAlternating { .. } => return Err(RejectReason::PlacementDisabled),
        ArbiterMode::LocalAlternating if state.turn.current_player() != Some(color) => {
            return Err(RejectReason::NotYourTurn);
        }
        _ => {}
    }
    if state.placements.contains(&color) {
        return Err(RejectReason::PlacementUsed);
    }
    if !position.is_finite() {
        return Err(RejectReason::InvalidPosition);
    }
    if state
        .nodes
        .iter()
        .any(|node| manhattan_distance(node.position, position) < constants.placement_min_spacing)
    {
        return Err(RejectReason::TooClose);
    }

    let id = NodeId(state.nodes.len());
    state.nodes.push(NodeState {
        id,
        position,
        radius: constants.node_radius,
        color,
        node_type,
        units: constants.placed_node_units.min(constants.max_units),
        max_connections: constants.placed_node_max_connections,
        current_connections: 0,
    });
    state.placements.insert(color);

    let first = state.meta.now_ms + node_type.production_interval_ms(&constants.production);
    state.scheduler.schedule(first, Timer::Production(id));
    push_event(
        state,
        events,
        Event::NodePlaced {
            node: id,
            color,
            node_type,
        },
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, duel_state, gated_state};
    use crate::MatchMode;

    #[test]
    fn placement_adds_a_producing_node_once() {
        let content = base_content();
        let mut state = duel_state(&content);
        let mut events = Vec::new();
        let at = Position::new(450.0, 100.0);

        let id = place_node(
            &mut state,
            &content.constants,
            Color::Green,
            at,
            NodeType::Plus,
            &mut events,
        )
        .unwrap();
        assert_eq!(id, NodeId(2));
        assert_eq!(state.nodes[2].units, 8);
        assert_eq!(state.nodes[2].max_connections, 3);
        assert!(state.scheduler.contains(Timer::Production(id)));

        let again = place_node(
            &mut state,
            &content.constants,
            Color::Green,
            Position::new(450.0, 500.0),
            NodeType::Circle,
            &mut events,
        );
        assert_eq!(again, Err(RejectReason::PlacementUsed));
    }

    #[test]
    fn placement_respects_spacing() {
        let content = base_content();
        let mut state = duel_state(&content);
        let mut events = Vec::new();
        // Green node sits at (150, 300); 40 + 29 = 69 is just too close.
        let result = place_node(
            &mut state,
            &content.constants,
            Color::Red,
            Position::new(190.0, 329.0),
            NodeType::Circle,
            &mut events,
        );
        assert_eq!(result, Err(RejectReason::TooClose));
        assert!(state.placements.is_empty());
    }

    #[test]
    fn non_finite_position_is_rejected() {
        let content = base_content();
        let mut state = duel_state(&content);
        let mut events = Vec::new();
        for at in [
            Position::new(f32::NAN, 300.0),
            Position::new(450.0, f32::INFINITY),
            Position::new(f32::NEG_INFINITY, f32::NAN),
        ] {
            let result = place_node(
                &mut state,
                &content.constants,
                Color::Green,
                at,
                NodeType::Circle,
                &mut events,
            );
            assert_eq!(result, Err(RejectReason::InvalidPosition));
        }
        assert_eq!(state.nodes.len(), 2);
        assert!(state.placements.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn placement_is_disabled_when_networked() {
        let content = base_content();
        let mut state = gated_state(&content, MatchMode::Networked { local: Color::Green });
        let mut events = Vec::new();
        let result = place_node(
            &mut state,
            &content.constants,
            Color::Green,
            Position::new(450.0, 100.0),
            NodeType::Circle,
            &mut events,
        );
        assert_eq!(result, Err(RejectReason::PlacementDisabled));
    }

    #[test]
    fn local_alternating_allows_only_current_player() {
        let content = base_content();
        let mut state = gated_state(&content, MatchMode::LocalTwoPlayer);
        let mut events = Vec::new();
        let result = place_node(
            &mut state,
            &content.constants,
            Color::Red,
            Position::new(450.0, 100.0),
            NodeType::Circle,
            &mut events,
        );
        assert_eq!(result, Err(RejectReason::NotYourTurn));
        let turn_before = state.turn.turn_number;
        assert!(place_node(
            &mut state,
            &content.constants,
            Color::Green,
            Position::new(450.0, 100.0),
            NodeType::Circle,
            &mut events,
        )
        .is_ok());
        assert_eq!(state.turn.turn_number, turn_before);
    }
}
