//! Type definitions for `cell_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the simulation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::scheduler::Scheduler;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! index_id {
    ($name:ident, $inner:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub $inner);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(CommandId);
string_id!(EventId);
string_id!(MatchId);

// Node ids are indices into `MatchState::nodes` and never change.
index_id!(NodeId, usize);
index_id!(ConnectionId, u64);
index_id!(UnitId, u64);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::Green => Color::Red,
            Color::Red => Color::Green,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Red => "red",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Circle,
    Plus,
    Triangle,
}

impl NodeType {
    /// Units added to a friendly node by one arriving unit from this type.
    pub fn support_amount(self) -> u32 {
        match self {
            NodeType::Plus => 2,
            NodeType::Circle | NodeType::Triangle => 1,
        }
    }

    /// Units removed from an enemy node by one arriving unit from this type.
    pub fn attack_damage(self) -> u32 {
        match self {
            NodeType::Triangle => 2,
            NodeType::Circle | NodeType::Plus => 1,
        }
    }

    pub fn production_interval_ms(self, intervals: &ProductionIntervals) -> u64 {
        match self {
            NodeType::Circle => intervals.circle_ms,
            NodeType::Plus => intervals.plus_ms,
            NodeType::Triangle => intervals.triangle_ms,
        }
    }
}

/// Who issued a command. Serialized the way history records spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "player")]
    Player,
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "network")]
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Normal,
    Debug,
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchState {
    pub meta: MetaState,
    pub setup: MatchSetup,
    /// Indexed by `NodeId`. Nodes are only ever appended.
    pub nodes: Vec<NodeState>,
    pub connections: BTreeMap<ConnectionId, ConnectionState>,
    /// Keyed by spawn order, which is also arrival-resolution order.
    pub units: BTreeMap<UnitId, TransitUnit>,
    pub turn: TurnState,
    pub round: RoundClock,
    /// Colors that have used their one-time node placement.
    pub placements: BTreeSet<Color>,
    pub history: Vec<HistoryEvent>,
    pub outcome: Option<MatchOutcome>,
    pub scheduler: Scheduler,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub match_id: MatchId,
    pub level: String,
    pub tick: u64,
    /// Simulation clock in milliseconds since match start.
    pub now_ms: u64,
    pub seed: u64,
    pub started: bool,
    pub schema_version: u32,
    pub content_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSetup {
    pub mode: MatchMode,
    /// Turn order in gated modes; also the set of sides checked for elimination.
    pub players: Vec<Color>,
    /// Sides driven by the AI planner on its own timer.
    pub ai_colors: Vec<Color>,
    /// Side whose point of view outcome notifications are written from.
    /// `None` for hot-seat play where both sides share one screen.
    pub perspective: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// Human against the AI; no turn gating.
    Single,
    /// Two players on one machine, strict alternation.
    LocalTwoPlayer,
    /// Two machines, strict alternation; `local` is this machine's side.
    Networked { local: Color },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_connection_id: u64,
    pub next_unit_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub id: NodeId,
    pub position: Position,
    pub radius: f32,
    pub color: Color,
    pub node_type: NodeType,
    pub units: u32,
    pub max_connections: u32,
    pub current_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionState {
    pub id: ConnectionId,
    pub source: NodeId,
    pub target: NodeId,
    /// Source color when the connection was opened.
    pub owner: Color,
    pub opened_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitUnit {
    pub id: UnitId,
    pub source: NodeId,
    pub target: NodeId,
    pub position: Position,
    pub destination: Position,
    pub source_color: Color,
    pub source_type: NodeType,
    /// Pixels per millisecond.
    pub speed: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    pub mode: ArbiterMode,
    pub players: Vec<Color>,
    pub current_index: usize,
    pub turn_number: u64,
    pub move_made: bool,
    pub phase: TurnPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbiterMode {
    Free,
    LocalAlternating,
    NetworkedAlternating { local: Color },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    WaitingForLocalMove,
    WaitingForRemoteMove,
    MatchEnded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundClock {
    pub total_seconds: u64,
    pub seconds_left: u64,
}

impl RoundClock {
    pub fn elapsed_seconds(&self) -> u64 {
        self.total_seconds.saturating_sub(self.seconds_left)
    }
}

// ---------------------------------------------------------------------------
// History and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    Attack,
    Support,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    #[serde(rename = "type")]
    pub kind: MoveKind,
    pub from: NodeId,
    pub to: NodeId,
    pub by: Origin,
    /// Elapsed round seconds when the move was made.
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub x: i32,
    pub y: i32,
    pub color: Color,
    pub units: u32,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHistory {
    pub match_id: MatchId,
    pub level: String,
    pub duration: u64,
    pub nodes: Vec<NodeSnapshot>,
    pub events: Vec<HistoryEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// `loser` owns no nodes.
    Elimination { winner: Color, loser: Color },
    /// Round clock ran out; `favored` is credited with the win.
    Timeout { favored: Color },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub kind: OutcomeKind,
    pub title: String,
    pub message: String,
    pub ended_ms: u64,
}

impl MatchOutcome {
    pub fn winner(&self) -> Color {
        match self.kind {
            OutcomeKind::Elimination { winner, .. } => winner,
            OutcomeKind::Timeout { favored } => favored,
        }
    }
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_by: Color,
    pub origin: Origin,
    pub issued_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    Connect {
        from: NodeId,
        to: NodeId,
    },
    Cancel {
        connection: ConnectionId,
    },
    PlaceNode {
        position: Position,
        node_type: NodeType,
    },
    /// Raw bytes received from the peer; decoded on the simulation timeline.
    RemoteMove {
        payload: Vec<u8>,
    },
    /// The network worker lost the peer.
    TransportLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnknownNode,
    UnknownConnection,
    SelfTarget,
    NotOwner,
    CapacityExceeded,
    NotYourTurn,
    MoveAlreadyMade,
    PlacementUsed,
    PlacementDisabled,
    TooClose,
    /// Placement coordinates were NaN or infinite.
    InvalidPosition,
    WrongMode,
    MatchOver,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub at_ms: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MatchStarted {
        level: String,
        mode: MatchMode,
    },
    TurnChanged {
        color: Color,
        turn_number: u64,
    },
    ConnectionOpened {
        connection: ConnectionId,
        from: NodeId,
        to: NodeId,
        owner: Color,
    },
    ConnectionCancelled {
        connection: ConnectionId,
    },
    ConnectionInvalidated {
        connection: ConnectionId,
        captured: NodeId,
    },
    UnitArrived {
        unit: UnitId,
        node: NodeId,
        kind: MoveKind,
        amount: u32,
        units_after: u32,
    },
    NodeCaptured {
        node: NodeId,
        previous: Color,
        color: Color,
    },
    NodePlaced {
        node: NodeId,
        color: Color,
        node_type: NodeType,
    },
    /// Serialized move to hand to the transport's send primitive.
    OutboundMove {
        payload: String,
    },
    RemotePayloadRejected {
        reason: String,
    },
    NetworkDegraded,
    PlannerWake {
        color: Color,
    },
    MatchEnded {
        outcome: MatchOutcome,
        history: MatchHistory,
    },
    /// Only emitted at `EventLevel::Debug`.
    MoveRejected {
        issued_by: Color,
        reason: RejectReason,
    },
    /// Only emitted at `EventLevel::Debug`.
    UnitProduced {
        node: NodeId,
        units: u32,
    },
    /// Only emitted at `EventLevel::Debug`.
    UnitDispatched {
        unit: UnitId,
        connection: ConnectionId,
    },
    /// Only emitted at `EventLevel::Debug`.
    RoundClockTick {
        seconds_left: u64,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchContent {
    pub content_version: String,
    pub levels: Vec<LevelDef>,
    pub constants: Constants,
}

impl MatchContent {
    pub fn level(&self, name: &str) -> Option<&LevelDef> {
        self.levels.iter().find(|level| level.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub name: String,
    pub nodes: Vec<NodeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub x: f32,
    pub y: f32,
    pub color: Color,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub units: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionIntervals {
    pub circle_ms: u64,
    pub plus_ms: u64,
    pub triangle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    /// Length of one `tick()` call.
    pub tick_ms: u64,
    pub max_units: u32,
    pub node_radius: f32,
    pub production: ProductionIntervals,
    pub connection_emit_interval_ms: u64,
    pub movement_interval_ms: u64,
    /// Pixels travelled per movement step.
    pub unit_speed: f32,
    pub round_seconds: u64,
    pub turn_duration_ms: u64,
    /// Side credited when the round clock runs out.
    pub timeout_favors: Color,
    pub placement_min_spacing: f32,
    pub placed_node_units: u32,
    pub placed_node_max_connections: u32,
    pub ai_interval_ms: u64,
    pub ai_min_source_units: u32,
    pub ai_attack_margin_weight: f32,
    pub ai_attack_distance_weight: f32,
    pub ai_plus_target_bonus: f32,
    pub ai_risky_margin: u32,
    pub ai_risky_penalty: f32,
    pub ai_support_units_weight: f32,
    pub ai_support_distance_weight: f32,
    pub ai_threat_radius: f32,
    pub ai_threat_bonus: f32,
    pub hint_ally_radius: f32,
    pub hint_ally_bonus: f32,
    pub hint_dominance_bonus: f32,
    /// Node-count lead above which the hint favors attacking.
    pub hint_dominance_lead: i64,
}
