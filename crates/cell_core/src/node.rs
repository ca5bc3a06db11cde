//! Node operations. None of them fail; all arithmetic saturates.

use crate::{Color, NodeState};

impl NodeState {
    pub fn can_connect(&self) -> bool {
        self.current_connections < self.max_connections
    }

    pub fn register_connection(&mut self) {
        if self.current_connections < self.max_connections {
            self.current_connections += 1;
        }
    }

    pub fn unregister_connection(&mut self) {
        self.current_connections = self.current_connections.saturating_sub(1);
    }

    /// One production step: +1 unless already at `max_units`.
    pub fn produce_unit(&mut self, max_units: u32) -> bool {
        if self.units < max_units {
            self.units += 1;
            true
        } else {
            false
        }
    }

    pub fn decrease_unit(&mut self, amount: u32) {
        self.units = self.units.saturating_sub(amount);
    }

    /// Friendly arrival. Capped at `max_units` like production.
    pub fn reinforce(&mut self, amount: u32, max_units: u32) {
        self.units = self.units.saturating_add(amount).min(max_units);
    }

    /// Node-local half of a capture. Connections touching the node are swept
    /// separately by `connection::invalidate_touching`.
    pub fn apply_capture(&mut self, new_color: Color) {
        self.color = new_color;
        self.units = 1;
        self.current_connections = 0;
    }
}

#[cfg(test)]
mod tests {
    use crate::test_fixtures::node;
    use crate::{Color, NodeType};

    #[test]
    fn can_connect_until_capacity_reached() {
        let mut n = node(0, 0.0, 0.0, Color::Green, NodeType::Circle, 5);
        n.max_connections = 2;
        assert!(n.can_connect());
        n.register_connection();
        assert!(n.can_connect());
        n.register_connection();
        assert!(!n.can_connect());
        n.register_connection();
        assert_eq!(n.current_connections, 2);
    }

    #[test]
    fn unregister_clamps_at_zero() {
        let mut n = node(0, 0.0, 0.0, Color::Green, NodeType::Circle, 5);
        n.unregister_connection();
        assert_eq!(n.current_connections, 0);
        n.register_connection();
        n.unregister_connection();
        n.unregister_connection();
        assert_eq!(n.current_connections, 0);
    }

    #[test]
    fn production_stops_at_cap() {
        let mut n = node(0, 0.0, 0.0, Color::Red, NodeType::Plus, 29);
        assert!(n.produce_unit(30));
        assert_eq!(n.units, 30);
        assert!(!n.produce_unit(30));
        assert_eq!(n.units, 30);
    }

    #[test]
    fn decrease_saturates_at_zero() {
        let mut n = node(0, 0.0, 0.0, Color::Red, NodeType::Circle, 1);
        n.decrease_unit(2);
        assert_eq!(n.units, 0);
        n.decrease_unit(5);
        assert_eq!(n.units, 0);
    }

    #[test]
    fn reinforce_is_capped() {
        let mut n = node(0, 0.0, 0.0, Color::Green, NodeType::Circle, 29);
        n.reinforce(2, 30);
        assert_eq!(n.units, 30);
    }

    #[test]
    fn capture_resets_units_and_connections() {
        let mut n = node(0, 0.0, 0.0, Color::Red, NodeType::Triangle, 0);
        n.max_connections = 3;
        n.current_connections = 3;
        n.apply_capture(Color::Green);
        assert_eq!(n.color, Color::Green);
        assert_eq!(n.units, 1);
        assert_eq!(n.current_connections, 0);
        assert_eq!(n.node_type, NodeType::Triangle);
    }

    #[test]
    fn unit_count_stays_in_bounds_over_mixed_sequence() {
        let mut n = node(0, 0.0, 0.0, Color::Red, NodeType::Circle, 10);
        for step in 0..200u32 {
            match step % 5 {
                0 | 1 => {
                    n.produce_unit(30);
                }
                2 => n.decrease_unit(step % 7),
                3 => n.reinforce(2, 30),
                _ => {
                    if n.units == 0 {
                        n.apply_capture(n.color.opponent());
                    }
                }
            }
            assert!(n.units <= 30, "units {} above cap at step {step}", n.units);
        }
    }
}
