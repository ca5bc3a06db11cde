//! Content validation tests for the shipped `content/*.json` files.
//!
//! These tests load the real content directory and check:
//! 1. Schema validity: both files deserialize
//! 2. Range constraints: positive intervals, unit counts within the cap
//! 3. Level invariants: every level is playable from both sides
//! 4. Balance sanity: starting positions leave room to place nodes

use cell_core::{manhattan_distance, Color, MatchContent, MatchMode, NodeType, Position};
use cell_world::{build_initial_state, load_content, match_rng, setup_for_mode};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Integration tests run from the crate directory, so go up two levels.
fn content_dir() -> String {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    format!("{manifest}/../../content")
}

fn load_test_content() -> &'static MatchContent {
    static CONTENT: OnceLock<MatchContent> = OnceLock::new();
    CONTENT.get_or_init(|| {
        load_content(&content_dir()).expect("load_content should succeed for shipped content")
    })
}

// =========================================================================
// 1. Schema validation
// =========================================================================

#[test]
fn content_loads_successfully() {
    let content = load_test_content();
    assert_eq!(content.levels.len(), 5);
}

#[test]
fn missing_directory_is_an_error() {
    let err = load_content("/definitely/not/here").unwrap_err();
    assert!(format!("{err:#}").contains("constants.json"));
}

// =========================================================================
// 2. Range constraints
// =========================================================================

#[test]
fn production_intervals_match_node_types() {
    let c = &load_test_content().constants;
    assert_eq!(NodeType::Plus.production_interval_ms(&c.production), 1500);
    assert_eq!(NodeType::Circle.production_interval_ms(&c.production), 2000);
    assert_eq!(NodeType::Triangle.production_interval_ms(&c.production), 2500);
}

#[test]
fn starting_units_are_within_cap() {
    let content = load_test_content();
    for level in &content.levels {
        for node in &level.nodes {
            assert!(node.units > 0, "{}: empty starting node", level.name);
            assert!(node.units <= content.constants.max_units);
            assert!((1..=3).contains(&node.max_connections));
        }
    }
}

// =========================================================================
// 3. Level invariants
// =========================================================================

#[test]
fn level_names_are_unique_and_ordered() {
    let content = load_test_content();
    let names: Vec<&str> = content.levels.iter().map(|l| l.name.as_str()).collect();
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(names[0], "Level 1");
    assert_eq!(names[4], "Level 5");
}

#[test]
fn every_level_gives_each_side_a_node() {
    let content = load_test_content();
    for level in &content.levels {
        for color in [Color::Green, Color::Red] {
            assert!(
                level.nodes.iter().any(|n| n.color == color),
                "{} has no {color} node",
                level.name
            );
        }
    }
}

#[test]
fn nodes_do_not_share_positions() {
    let content = load_test_content();
    for level in &content.levels {
        let positions: HashSet<(i64, i64)> = level
            .nodes
            .iter()
            .map(|n| (n.x as i64, n.y as i64))
            .collect();
        assert_eq!(positions.len(), level.nodes.len(), "{}", level.name);
    }
}

#[test]
fn every_level_builds_a_startable_state() {
    let content = load_test_content();
    for level in &content.levels {
        let setup = setup_for_mode(MatchMode::Single);
        let state = build_initial_state(content, level, setup, 7, &mut match_rng(7));
        assert_eq!(state.nodes.len(), level.nodes.len());
        assert!(state.outcome.is_none());
    }
}

// =========================================================================
// 4. Balance sanity
// =========================================================================

#[test]
fn nodes_are_spaced_at_least_placement_distance() {
    let content = load_test_content();
    let spacing = content.constants.placement_min_spacing;
    for level in &content.levels {
        for (i, a) in level.nodes.iter().enumerate() {
            for b in &level.nodes[i + 1..] {
                let d = manhattan_distance(Position::new(a.x, a.y), Position::new(b.x, b.y));
                assert!(d >= spacing, "{}: nodes only {d} apart", level.name);
            }
        }
    }
}
