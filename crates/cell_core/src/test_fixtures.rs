//! Shared test fixtures for `cell_core` and downstream crates.
//!
//! `base_content()` carries the stock tuning and a single one-on-one level.
//! `duel_state()` is that level set up for a human (green) against the AI
//! (red); `gated_state()` is the same board under turn alternation.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    ArbiterMode, Color, Command, CommandEnvelope, CommandId, Constants, Counters, LevelDef,
    MatchContent, MatchId, MatchMode, MatchSetup, MatchState, MetaState, NodeDef, NodeId,
    NodeState, NodeType, Origin, Position, ProductionIntervals, RoundClock, Scheduler,
    TransitUnit, TurnState, UnitId,
};

pub const GREEN_NODE: NodeId = NodeId(0);
pub const RED_NODE: NodeId = NodeId(1);

pub fn base_constants() -> Constants {
    Constants {
        tick_ms: 16,
        max_units: 30,
        node_radius: 30.0,
        production: ProductionIntervals {
            circle_ms: 2000,
            plus_ms: 1500,
            triangle_ms: 2500,
        },
        connection_emit_interval_ms: 1000,
        movement_interval_ms: 16,
        unit_speed: 1.5,
        round_seconds: 120,
        turn_duration_ms: 10_000,
        timeout_favors: Color::Red,
        placement_min_spacing: 70.0,
        placed_node_units: 8,
        placed_node_max_connections: 3,
        ai_interval_ms: 2000,
        ai_min_source_units: 2,
        ai_attack_margin_weight: 10.0,
        ai_attack_distance_weight: 0.2,
        ai_plus_target_bonus: 20.0,
        ai_risky_margin: 3,
        ai_risky_penalty: 30.0,
        ai_support_units_weight: 5.0,
        ai_support_distance_weight: 0.1,
        ai_threat_radius: 200.0,
        ai_threat_bonus: 15.0,
        hint_ally_radius: 150.0,
        hint_ally_bonus: 5.0,
        hint_dominance_bonus: 10.0,
        hint_dominance_lead: 2,
    }
}

/// Green circle (10 units, 2 slots) at (150, 300) against a red circle
/// (5 units, 1 slot) at (800, 300).
pub fn duel_level() -> LevelDef {
    LevelDef {
        name: "Level 1".to_string(),
        nodes: vec![
            NodeDef {
                x: 150.0,
                y: 300.0,
                color: Color::Green,
                node_type: NodeType::Circle,
                units: 10,
                max_connections: 2,
            },
            NodeDef {
                x: 800.0,
                y: 300.0,
                color: Color::Red,
                node_type: NodeType::Circle,
                units: 5,
                max_connections: 1,
            },
        ],
    }
}

pub fn base_content() -> MatchContent {
    MatchContent {
        content_version: "test".to_string(),
        levels: vec![duel_level()],
        constants: base_constants(),
    }
}

pub fn node(index: usize, x: f32, y: f32, color: Color, node_type: NodeType, units: u32) -> NodeState {
    NodeState {
        id: NodeId(index),
        position: Position::new(x, y),
        radius: 30.0,
        color,
        node_type,
        units,
        max_connections: 3,
        current_connections: 0,
    }
}

/// A unit already in flight. `speed` matches the stock 1.5 px per 16 ms.
pub fn unit_toward(
    from: Position,
    destination: Position,
    target: NodeId,
    color: Color,
    source_type: NodeType,
) -> TransitUnit {
    TransitUnit {
        id: UnitId(0),
        source: NodeId(usize::MAX),
        target,
        position: from,
        destination,
        source_color: color,
        source_type,
        speed: 1.5 / 16.0,
    }
}

/// Builds an unstarted match over `level` with the given setup.
pub fn state_for_level(content: &MatchContent, level: &LevelDef, setup: MatchSetup) -> MatchState {
    let nodes = level
        .nodes
        .iter()
        .enumerate()
        .map(|(index, def)| NodeState {
            id: NodeId(index),
            position: Position::new(def.x, def.y),
            radius: content.constants.node_radius,
            color: def.color,
            node_type: def.node_type,
            units: def.units,
            max_connections: def.max_connections,
            current_connections: 0,
        })
        .collect();

    let turn = TurnState::new(ArbiterMode::from_match_mode(setup.mode), setup.players.clone());
    MatchState {
        meta: MetaState {
            match_id: MatchId("match_test".to_string()),
            level: level.name.clone(),
            tick: 0,
            now_ms: 0,
            seed: 42,
            started: false,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        setup,
        nodes,
        connections: BTreeMap::new(),
        units: BTreeMap::new(),
        turn,
        round: RoundClock {
            total_seconds: content.constants.round_seconds,
            seconds_left: content.constants.round_seconds,
        },
        placements: BTreeSet::new(),
        history: Vec::new(),
        outcome: None,
        scheduler: Scheduler::new(),
        counters: Counters {
            next_event_id: 0,
            next_connection_id: 0,
            next_unit_id: 0,
        },
    }
}

/// Human (green) against the AI (red), no turn gating.
pub fn duel_state(content: &MatchContent) -> MatchState {
    let setup = MatchSetup {
        mode: MatchMode::Single,
        players: vec![Color::Green, Color::Red],
        ai_colors: vec![Color::Red],
        perspective: Some(Color::Green),
    };
    state_for_level(content, &duel_level(), setup)
}

/// The duel board under strict alternation, green moving first.
pub fn gated_state(content: &MatchContent, mode: MatchMode) -> MatchState {
    let perspective = match mode {
        MatchMode::Networked { local } => Some(local),
        MatchMode::Single | MatchMode::LocalTwoPlayer => None,
    };
    let setup = MatchSetup {
        mode,
        players: vec![Color::Green, Color::Red],
        ai_colors: Vec::new(),
        perspective,
    };
    state_for_level(content, &duel_level(), setup)
}

/// Wraps a command the way the daemon and CLI do.
pub fn cmd(issued_by: Color, origin: Origin, issued_tick: u64, command: Command) -> CommandEnvelope {
    CommandEnvelope {
        id: CommandId(format!("cmd_{issued_tick:06}")),
        issued_by,
        origin,
        issued_tick,
        command,
    }
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
