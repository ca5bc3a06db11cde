//! Snapshot metrics computed from `MatchState`.
//!
//! `compute_metrics(&MatchState) -> MatchMetrics` samples the board for status
//! output and for the hint's dominance rule. No state mutation, no IO beyond
//! the CSV helpers, which write to a caller-supplied writer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Color, MatchState};

/// Bump when CSV columns are added, removed or reordered.
const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct MatchMetrics {
    pub tick: u64,
    pub metrics_version: u32,
    pub now_ms: u64,
    pub seconds_left: u64,
    pub nodes_by_color: BTreeMap<Color, u32>,
    pub units_by_color: BTreeMap<Color, u32>,
    pub connections_by_color: BTreeMap<Color, u32>,
    pub units_in_transit: u32,
}

impl MatchMetrics {
    pub fn nodes(&self, color: Color) -> u32 {
        self.nodes_by_color.get(&color).copied().unwrap_or(0)
    }

    pub fn units(&self, color: Color) -> u32 {
        self.units_by_color.get(&color).copied().unwrap_or(0)
    }

    pub fn connections(&self, color: Color) -> u32 {
        self.connections_by_color.get(&color).copied().unwrap_or(0)
    }

    /// Own node count minus the opponent's.
    pub fn node_lead(&self, color: Color) -> i64 {
        i64::from(self.nodes(color)) - i64::from(self.nodes(color.opponent()))
    }
}

pub fn compute_metrics(state: &MatchState) -> MatchMetrics {
    let mut nodes_by_color = BTreeMap::from([(Color::Green, 0), (Color::Red, 0)]);
    let mut units_by_color = nodes_by_color.clone();
    let mut connections_by_color = nodes_by_color.clone();

    for node in &state.nodes {
        *nodes_by_color.entry(node.color).or_insert(0) += 1;
        *units_by_color.entry(node.color).or_insert(0) += node.units;
    }
    for connection in state.connections.values() {
        *connections_by_color.entry(connection.owner).or_insert(0) += 1;
    }

    MatchMetrics {
        tick: state.meta.tick,
        metrics_version: METRICS_VERSION,
        now_ms: state.meta.now_ms,
        seconds_left: state.round.seconds_left,
        nodes_by_color,
        units_by_color,
        connections_by_color,
        units_in_transit: u32::try_from(state.units.len()).unwrap_or(u32::MAX),
    }
}

/// Write the CSV header row.
pub fn write_metrics_header(writer: &mut impl std::io::Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "tick,metrics_version,now_ms,seconds_left,\
         green_nodes,red_nodes,green_units,red_units,\
         green_connections,red_connections,units_in_transit"
    )
}

/// Append a single metrics snapshot as a CSV row.
pub fn append_metrics_row(
    writer: &mut impl std::io::Write,
    metrics: &MatchMetrics,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{},{},{},{}",
        metrics.tick,
        metrics.metrics_version,
        metrics.now_ms,
        metrics.seconds_left,
        metrics.nodes(Color::Green),
        metrics.nodes(Color::Red),
        metrics.units(Color::Green),
        metrics.units(Color::Red),
        metrics.connections(Color::Green),
        metrics.connections(Color::Red),
        metrics.units_in_transit,
    )
}
