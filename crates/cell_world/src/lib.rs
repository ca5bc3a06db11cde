//! Content loading, match setup and the history sink, shared between
//! cell_cli and cell_daemon.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use cell_core::{
    manhattan_distance, ArbiterMode, Color, Constants, Counters, LevelDef, MatchContent,
    MatchHistory, MatchId, MatchMode, MatchSetup, MatchState, MetaState, NodeDef, NodeId,
    NodeState, NodeType, Position, RoundClock, Scheduler, TurnState,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const SCHEMA_VERSION: u32 = 1;

/// Playing field used by the skirmish generator.
const BOARD_WIDTH: f32 = 1000.0;
const BOARD_HEIGHT: f32 = 700.0;
const BOARD_MARGIN: f32 = 80.0;

#[derive(Deserialize)]
struct LevelsFile {
    content_version: String,
    levels: Vec<LevelDef>,
}

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like: two levels sharing a name, a level where one side
/// starts without nodes, or a zero interval that would stall the scheduler.
pub fn validate_content(content: &MatchContent) {
    let c = &content.constants;
    assert!(c.tick_ms > 0, "tick_ms must be positive");
    assert!(c.movement_interval_ms > 0, "movement_interval_ms must be positive");
    assert!(
        c.connection_emit_interval_ms > 0,
        "connection_emit_interval_ms must be positive"
    );
    assert!(c.ai_interval_ms > 0, "ai_interval_ms must be positive");
    for (name, interval) in [
        ("circle", c.production.circle_ms),
        ("plus", c.production.plus_ms),
        ("triangle", c.production.triangle_ms),
    ] {
        assert!(interval > 0, "{name} production interval must be positive");
    }
    assert!(c.unit_speed > 0.0, "unit_speed must be positive");
    assert!(c.round_seconds > 0, "round_seconds must be positive");
    assert!(c.max_units > 0, "max_units must be positive");

    assert!(!content.levels.is_empty(), "content defines no levels");
    let mut names = HashSet::new();
    for level in &content.levels {
        assert!(
            names.insert(level.name.as_str()),
            "level name '{}' is used twice",
            level.name,
        );
        validate_level(level, c);
    }
}

fn validate_level(level: &LevelDef, c: &Constants) {
    for color in [Color::Green, Color::Red] {
        assert!(
            level.nodes.iter().any(|n| n.color == color),
            "level '{}' has no {color} node",
            level.name,
        );
    }
    for (index, node) in level.nodes.iter().enumerate() {
        assert!(
            node.units <= c.max_units,
            "level '{}' node {index} starts with {} units, above max {}",
            level.name,
            node.units,
            c.max_units,
        );
        assert!(
            node.max_connections > 0,
            "level '{}' node {index} has no connection slots",
            level.name,
        );
    }
}

pub fn load_content(content_dir: &str) -> Result<MatchContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let levels_file: LevelsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("levels.json")).context("reading levels.json")?,
    )
    .context("parsing levels.json")?;
    let content = MatchContent {
        content_version: levels_file.content_version,
        levels: levels_file.levels,
        constants,
    };
    validate_content(&content);
    Ok(content)
}

/// Who plays which side for a given mode.
pub fn setup_for_mode(mode: MatchMode) -> MatchSetup {
    let players = vec![Color::Green, Color::Red];
    match mode {
        MatchMode::Single => MatchSetup {
            mode,
            players,
            ai_colors: vec![Color::Red],
            perspective: Some(Color::Green),
        },
        MatchMode::LocalTwoPlayer => MatchSetup {
            mode,
            players,
            ai_colors: Vec::new(),
            perspective: None,
        },
        MatchMode::Networked { local } => MatchSetup {
            mode,
            players,
            ai_colors: Vec::new(),
            perspective: Some(local),
        },
    }
}

pub fn build_initial_state(
    content: &MatchContent,
    level: &LevelDef,
    setup: MatchSetup,
    seed: u64,
    rng: &mut impl Rng,
) -> MatchState {
    let c = &content.constants;
    let nodes = level
        .nodes
        .iter()
        .enumerate()
        .map(|(index, def)| NodeState {
            id: NodeId(index),
            position: Position::new(def.x, def.y),
            radius: c.node_radius,
            color: def.color,
            node_type: def.node_type,
            units: def.units.min(c.max_units),
            max_connections: def.max_connections,
            current_connections: 0,
        })
        .collect();
    let turn = TurnState::new(
        ArbiterMode::from_match_mode(setup.mode),
        setup.players.clone(),
    );

    MatchState {
        meta: MetaState {
            match_id: MatchId::from_rng(rng),
            level: level.name.clone(),
            tick: 0,
            now_ms: 0,
            seed,
            started: false,
            schema_version: SCHEMA_VERSION,
            content_version: content.content_version.clone(),
        },
        setup,
        nodes,
        connections: BTreeMap::new(),
        units: BTreeMap::new(),
        turn,
        round: RoundClock {
            total_seconds: c.round_seconds,
            seconds_left: c.round_seconds,
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

/// Seeded RNG used for match ids and skirmish layouts.
pub fn match_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

// ---------------------------------------------------------------------------
// Generated and resumed levels
// ---------------------------------------------------------------------------

/// Procedural level: `per_side` green nodes on the left half, mirrored onto
/// the right half for red so neither side starts ahead. Candidates too close
/// to an existing node are redrawn a bounded number of times, so a crowded
/// request can return fewer nodes than asked for.
pub fn generate_skirmish(content: &MatchContent, per_side: usize, rng: &mut impl Rng) -> LevelDef {
    const ATTEMPTS_PER_NODE: usize = 50;
    let spacing = content.constants.placement_min_spacing;
    let types = [NodeType::Circle, NodeType::Plus, NodeType::Triangle];

    let mut green: Vec<NodeDef> = Vec::with_capacity(per_side);
    for _ in 0..per_side * ATTEMPTS_PER_NODE {
        if green.len() == per_side {
            break;
        }
        let x = rng.gen_range(BOARD_MARGIN..BOARD_WIDTH / 2.0 - spacing / 2.0);
        let y = rng.gen_range(BOARD_MARGIN..BOARD_HEIGHT - BOARD_MARGIN);
        let at = Position::new(x.round(), y.round());
        let too_close = green
            .iter()
            .any(|n| manhattan_distance(Position::new(n.x, n.y), at) < spacing);
        if too_close {
            continue;
        }
        green.push(NodeDef {
            x: at.x,
            y: at.y,
            color: Color::Green,
            node_type: types[rng.gen_range(0..types.len())],
            units: rng.gen_range(5..=12).min(content.constants.max_units),
            max_connections: rng.gen_range(1..=3),
        });
    }

    let red: Vec<NodeDef> = green
        .iter()
        .map(|n| NodeDef {
            x: BOARD_WIDTH - n.x,
            color: Color::Red,
            ..n.clone()
        })
        .collect();
    LevelDef {
        name: format!("Skirmish {per_side}v{per_side}"),
        nodes: green.into_iter().chain(red).collect(),
    }
}

/// Turns a recorded match back into a level starting from its final board.
/// Connection slots come from the level the match was played on; nodes it
/// never had (one-time placements) get the placement default.
pub fn level_from_history(content: &MatchContent, history: &MatchHistory) -> LevelDef {
    let original = content.level(&history.level);
    let nodes = history
        .nodes
        .iter()
        .enumerate()
        .map(|(index, snapshot)| NodeDef {
            x: snapshot.x as f32,
            y: snapshot.y as f32,
            color: snapshot.color,
            node_type: snapshot.node_type,
            units: snapshot.units.min(content.constants.max_units),
            max_connections: original
                .and_then(|level| level.nodes.get(index))
                .map_or(content.constants.placed_node_max_connections, |n| {
                    n.max_connections
                }),
        })
        .collect();
    LevelDef {
        name: format!("{} (resumed)", history.level),
        nodes,
    }
}

// ---------------------------------------------------------------------------
// History sink
// ---------------------------------------------------------------------------

/// On-disk wrapper around a finished match's history.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub recorded_at: String,
    pub history: MatchHistory,
}

pub fn save_history(path: &Path, history: &MatchHistory) -> Result<()> {
    let record = HistoryRecord {
        recorded_at: chrono::Utc::now().to_rfc3339(),
        history: history.clone(),
    };
    let json = serde_json::to_string_pretty(&record).context("serializing match history")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

pub fn load_history(path: &Path) -> Result<MatchHistory> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let record: HistoryRecord = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(record.history)
}
