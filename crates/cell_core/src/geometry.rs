use crate::{MatchState, NodeId, Position};

/// Manhattan distance, the metric every scoring and spacing rule uses.
pub fn manhattan_distance(a: Position, b: Position) -> f32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Finds the node whose integer-truncated position equals `at`.
/// Returns the lowest index when several nodes share a position.
pub fn node_at_position(state: &MatchState, at: [i32; 2]) -> Option<NodeId> {
    state
        .nodes
        .iter()
        .find(|node| integer_position(node.position) == at)
        .map(|node| node.id)
}

#[allow(clippy::cast_possible_truncation)]
pub fn integer_position(position: Position) -> [i32; 2] {
    [position.x as i32, position.y as i32]
}
