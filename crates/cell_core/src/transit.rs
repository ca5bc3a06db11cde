//! Transit units: movement and arrival resolution.

use smallvec::SmallVec;

use crate::connection::invalidate_touching;
use crate::{
    push_event, Constants, Event, EventEnvelope, MatchState, MoveKind, NodeId, TransitUnit, UnitId,
};

impl TransitUnit {
    /// Moves toward the destination for `dt_ms`. Returns `true` on arrival, in
    /// which case the unit sits exactly on its destination.
    pub fn advance(&mut self, dt_ms: u64) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let step = self.speed * dt_ms as f32;
        let dx = self.destination.x - self.position.x;
        let dy = self.destination.y - self.position.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < step || dist <= f32::EPSILON {
            self.position = self.destination;
            return true;
        }
        self.position.x += dx / dist * step;
        self.position.y += dy / dist * step;
        false
    }
}

/// Movement timer body: advances every unit one step, then resolves arrivals
/// one at a time in spawn order.
pub(crate) fn advance_units(
    state: &mut MatchState,
    constants: &Constants,
    dt_ms: u64,
    events: &mut Vec<EventEnvelope>,
) -> Vec<NodeId> {
    let mut arrived: SmallVec<[UnitId; 8]> = SmallVec::new();
    for unit in state.units.values_mut() {
        if unit.advance(dt_ms) {
            arrived.push(unit.id);
        }
    }

    let mut captured = Vec::new();
    for id in arrived {
        let Some(unit) = state.units.remove(&id) else {
            continue;
        };
        if let Some(node) = resolve_arrival(state, constants, unit, events) {
            captured.push(node);
        }
    }
    captured
}

/// Applies one unit's effect to its target. Takes the unit by value so an
/// arrival can never be applied twice. Returns the node if it was captured.
pub(crate) fn resolve_arrival(
    state: &mut MatchState,
    constants: &Constants,
    unit: TransitUnit,
    events: &mut Vec<EventEnvelope>,
) -> Option<NodeId> {
    let target = state.nodes.get_mut(unit.target.0)?;

    if target.color == unit.source_color {
        let amount = unit.source_type.support_amount();
        target.reinforce(amount, constants.max_units);
        let units_after = target.units;
        push_event(
            state,
            events,
            Event::UnitArrived {
                unit: unit.id,
                node: unit.target,
                kind: MoveKind::Support,
                amount,
                units_after,
            },
        );
        return None;
    }

    let amount = unit.source_type.attack_damage();
    target.decrease_unit(amount);
    let units_after = target.units;
    push_event(
        state,
        events,
        Event::UnitArrived {
            unit: unit.id,
            node: unit.target,
            kind: MoveKind::Attack,
            amount,
            units_after,
        },
    );

    if units_after == 0 {
        capture(state, unit.target, unit.source_color, events);
        Some(unit.target)
    } else {
        None
    }
}

fn capture(
    state: &mut MatchState,
    node: NodeId,
    color: crate::Color,
    events: &mut Vec<EventEnvelope>,
) {
    let target = &mut state.nodes[node.0];
    let previous = target.color;
    target.apply_capture(color);
    invalidate_touching(state, node, events);
    push_event(
        state,
        events,
        Event::NodeCaptured {
            node,
            previous,
            color,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, duel_state, unit_toward, GREEN_NODE, RED_NODE};
    use crate::{Color, NodeType, Position};

    #[test]
    fn advance_moves_linearly_until_arrival() {
        let mut unit = unit_toward(
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            NodeId(1),
            Color::Green,
            NodeType::Circle,
        );
        unit.speed = 3.0;
        assert!(!unit.advance(1));
        assert!((unit.position.x - 3.0).abs() < 1e-4);
        assert!(!unit.advance(1));
        assert!(!unit.advance(1));
        assert!((unit.position.x - 9.0).abs() < 1e-4);
        assert!(unit.advance(1));
        assert_eq!(unit.position, Position::new(10.0, 0.0));
    }

    #[test]
    fn friendly_arrival_supports() {
        let content = base_content();
        let mut state = duel_state(&content);
        let mut events = Vec::new();
        let unit = unit_toward(
            Position::new(0.0, 0.0),
            state.nodes[GREEN_NODE.0].position,
            GREEN_NODE,
            Color::Green,
            NodeType::Circle,
        );
        assert!(resolve_arrival(&mut state, &content.constants, unit, &mut events).is_none());
        assert_eq!(state.nodes[GREEN_NODE.0].units, 11);
    }

    #[test]
    fn triangle_attack_deals_double_damage() {
        let content = base_content();
        let mut state = duel_state(&content);
        let mut events = Vec::new();
        let unit = unit_toward(
            Position::new(0.0, 0.0),
            state.nodes[RED_NODE.0].position,
            RED_NODE,
            Color::Green,
            NodeType::Triangle,
        );
        resolve_arrival(&mut state, &content.constants, unit, &mut events);
        assert_eq!(state.nodes[RED_NODE.0].units, 3);
    }

    #[test]
    fn overkill_still_captures_once() {
        let content = base_content();
        let mut state = duel_state(&content);
        state.nodes[RED_NODE.0].units = 1;
        let mut events = Vec::new();
        let unit = unit_toward(
            Position::new(0.0, 0.0),
            state.nodes[RED_NODE.0].position,
            RED_NODE,
            Color::Green,
            NodeType::Triangle,
        );
        let captured = resolve_arrival(&mut state, &content.constants, unit, &mut events);
        assert_eq!(captured, Some(RED_NODE));
        assert_eq!(state.nodes[RED_NODE.0].color, Color::Green);
        assert_eq!(state.nodes[RED_NODE.0].units, 1);
    }

    #[test]
    fn same_tick_arrivals_resolve_in_spawn_order() {
        let content = base_content();
        let mut state = duel_state(&content);
        state.nodes[RED_NODE.0].units = 1;
        let dest = state.nodes[RED_NODE.0].position;

        // Two green attackers then one red reinforcement, all arriving together.
        for (id, color) in [(0, Color::Green), (1, Color::Green), (2, Color::Red)] {
            let mut unit = unit_toward(dest, dest, RED_NODE, color, NodeType::Circle);
            unit.id = UnitId(id);
            state.units.insert(unit.id, unit);
        }

        let mut events = Vec::new();
        let captured = advance_units(&mut state, &content.constants, 16, &mut events);

        // Unit 0 captures (1 -> 0 -> green:1), unit 1 is now support (green:2),
        // unit 2 attacks the new owner (green:1). No second capture.
        assert_eq!(captured, vec![RED_NODE]);
        assert_eq!(state.nodes[RED_NODE.0].color, Color::Green);
        assert_eq!(state.nodes[RED_NODE.0].units, 1);
        assert!(state.units.is_empty());
        let captures = events
            .iter()
            .filter(|e| matches!(e.event, Event::NodeCaptured { .. }))
            .count();
        assert_eq!(captures, 1);
    }
}
