use cell_core::{
    compute_metrics, manhattan_distance, Color, Command, CommandEnvelope, CommandId, Constants,
    MatchContent, MatchState, MoveKind, NodeId, NodeState, NodeType, Origin,
};
use serde::Serialize;

pub trait CommandSource {
    fn generate_commands(
        &mut self,
        state: &MatchState,
        content: &MatchContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;
}

/// A scored connect suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlannedMove {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: MoveKind,
    pub score: f32,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Allocates a command ID and builds a `CommandEnvelope`.
fn make_cmd(
    issued_by: Color,
    origin: Origin,
    tick: u64,
    next_id: &mut u64,
    command: Command,
) -> CommandEnvelope {
    let cmd_id = CommandId(format!("cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_by,
        origin,
        issued_tick: tick,
        command,
    }
}

/// Base planner score for one (source, target) pair, or `None` when the pair
/// is not a sensible move.
fn score_pair(
    state: &MatchState,
    constants: &Constants,
    color: Color,
    source: &NodeState,
    target: &NodeState,
) -> Option<(MoveKind, f32)> {
    if target.units >= source.units {
        return None;
    }
    let distance = manhattan_distance(source.position, target.position);

    if target.color == color {
        let mut score = -constants.ai_support_units_weight * target.units as f32
            - distance * constants.ai_support_distance_weight;
        let threatened = state.nodes.iter().any(|n| {
            n.color != color
                && manhattan_distance(n.position, target.position) < constants.ai_threat_radius
        });
        if threatened {
            score += constants.ai_threat_bonus;
        }
        return Some((MoveKind::Support, score));
    }

    let margin = source.units - target.units;
    let mut score = margin as f32 * constants.ai_attack_margin_weight
        - distance * constants.ai_attack_distance_weight;
    if target.node_type == NodeType::Plus {
        score += constants.ai_plus_target_bonus;
    }
    if margin < constants.ai_risky_margin {
        score -= constants.ai_risky_penalty;
    }
    Some((MoveKind::Attack, score))
}

/// Scans sources then targets in node-index order. A later candidate must
/// score strictly higher to replace the current best.
fn best_move(
    state: &MatchState,
    constants: &Constants,
    color: Color,
    adjust: impl Fn(&NodeState, MoveKind) -> f32,
) -> Option<PlannedMove> {
    let has_own = state.nodes.iter().any(|n| n.color == color);
    let has_enemy = state.nodes.iter().any(|n| n.color != color);
    if !has_own || !has_enemy {
        return None;
    }

    let mut best: Option<PlannedMove> = None;
    let sources = state.nodes.iter().filter(|n| {
        n.color == color && n.units >= constants.ai_min_source_units && n.can_connect()
    });
    for source in sources {
        for target in state.nodes.iter().filter(|t| t.id != source.id && t.can_connect()) {
            let Some((kind, base)) = score_pair(state, constants, color, source, target) else {
                continue;
            };
            let score = base + adjust(target, kind);
            if best.is_none_or(|b| score > b.score) {
                best = Some(PlannedMove {
                    source: source.id,
                    target: target.id,
                    kind,
                    score,
                });
            }
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Planner and hint
// ---------------------------------------------------------------------------

/// The AI's move for `color` on this snapshot. Stateless and deterministic.
pub fn plan_move(state: &MatchState, constants: &Constants, color: Color) -> Option<PlannedMove> {
    best_move(state, constants, color, |_, _| 0.0)
}

/// Same search from the player's side, nudged toward attacks near friendly
/// nodes and adjusted for who is ahead on node count.
pub fn suggest_hint(state: &MatchState, constants: &Constants, color: Color) -> Option<PlannedMove> {
    let lead = compute_metrics(state).node_lead(color);
    best_move(state, constants, color, |target, kind| match kind {
        MoveKind::Attack => {
            let allies = state
                .nodes
                .iter()
                .filter(|n| {
                    n.color == color
                        && manhattan_distance(n.position, target.position)
                            < constants.hint_ally_radius
                })
                .count();
            let mut bonus = allies as f32 * constants.hint_ally_bonus;
            if lead > constants.hint_dominance_lead {
                bonus += constants.hint_dominance_bonus;
            }
            bonus
        }
        MoveKind::Support if lead < 0 => constants.hint_dominance_bonus,
        MoveKind::Support => 0.0,
    })
}

// ---------------------------------------------------------------------------
// Controllers
// ---------------------------------------------------------------------------

/// Plays `color` with the planner. Issues at most one connect per call; the
/// driver calls it when the match emits a planner wake-up for this color.
pub struct AiController {
    pub color: Color,
}

impl CommandSource for AiController {
    fn generate_commands(
        &mut self,
        state: &MatchState,
        content: &MatchContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        if state.turn.authorize(self.color).is_err() {
            return Vec::new();
        }
        plan_move(state, &content.constants, self.color)
            .map(|planned| {
                make_cmd(
                    self.color,
                    Origin::Ai,
                    state.meta.tick,
                    next_command_id,
                    Command::Connect {
                        from: planned.source,
                        to: planned.target,
                    },
                )
            })
            .into_iter()
            .collect()
    }
}

/// Headless stand-in for a human: follows its own hints.
pub struct HintFollower {
    pub color: Color,
}

impl CommandSource for HintFollower {
    fn generate_commands(
        &mut self,
        state: &MatchState,
        content: &MatchContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        if state.turn.authorize(self.color).is_err() {
            return Vec::new();
        }
        suggest_hint(state, &content.constants, self.color)
            .map(|hint| {
                make_cmd(
                    self.color,
                    Origin::Player,
                    state.meta.tick,
                    next_command_id,
                    Command::Connect {
                        from: hint.source,
                        to: hint.target,
                    },
                )
            })
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cell_core::test_fixtures::{base_content, duel_state, node, GREEN_NODE, RED_NODE};

    #[test]
    fn test_no_move_when_every_target_outnumbers_source() {
        let content = base_content();
        let state = duel_state(&content);
        // Red has 5 against green's 10 and nothing to support.
        assert!(plan_move(&state, &content.constants, Color::Red).is_none());
    }

    #[test]
    fn test_attack_score_applies_distance_and_risk() {
        let content = base_content();
        let mut state = duel_state(&content);
        state.nodes[GREEN_NODE.0].units = 3;
        let planned = plan_move(&state, &content.constants, Color::Red).unwrap();
        assert_eq!(planned.kind, MoveKind::Attack);
        assert_eq!((planned.source, planned.target), (RED_NODE, GREEN_NODE));
        // (5 - 3) * 10 - 650 * 0.2 - 30
        assert!((planned.score - (-140.0)).abs() < 1e-3);
    }

    #[test]
    fn test_plus_target_bonus_outweighs_distance() {
        let content = base_content();
        let mut state = duel_state(&content);
        state.nodes[GREEN_NODE.0].units = 20;
        state.nodes[RED_NODE.0].units = 20;
        state.nodes.push(node(2, 700.0, 300.0, Color::Green, NodeType::Circle, 4));
        state.nodes.push(node(3, 600.0, 300.0, Color::Green, NodeType::Plus, 4));
        let planned = plan_move(&state, &content.constants, Color::Red).unwrap();
        // Node 2: 160 - 20 = 140. Node 3: 160 - 40 + 20 = 140. Tie keeps node 2;
        // nudging node 3 one pixel closer makes it win.
        assert_eq!(planned.target, NodeId(2));

        state.nodes[3].position.x = 601.0;
        let planned = plan_move(&state, &content.constants, Color::Red).unwrap();
        assert_eq!(planned.target, NodeId(3));
    }

    #[test]
    fn test_support_prefers_threatened_weak_node() {
        let content = base_content();
        let mut state = duel_state(&content);
        state.nodes[RED_NODE.0].units = 12;
        state.nodes.push(node(2, 800.0, 650.0, Color::Red, NodeType::Circle, 2));
        state.nodes.push(node(3, 340.0, 300.0, Color::Red, NodeType::Circle, 2));
        let planned = plan_move(&state, &content.constants, Color::Red).unwrap();
        assert_eq!(planned.kind, MoveKind::Support);
        // Node 2: -10 - 35 = -45. Node 3 sits within 200 of green:
        // -10 - 46 + 15 = -41.
        assert_eq!(planned.target, NodeId(3));
    }

    #[test]
    fn test_full_sources_are_skipped() {
        let content = base_content();
        let mut state = duel_state(&content);
        state.nodes[GREEN_NODE.0].units = 1;
        state.nodes[RED_NODE.0].current_connections = 1;
        assert!(plan_move(&state, &content.constants, Color::Red).is_none());
    }

    #[test]
    fn test_hint_rewards_dominance() {
        let content = base_content();
        let mut state = duel_state(&content);
        for (i, x) in [(2, 300.0), (3, 450.0), (4, 600.0)] {
            state.nodes.push(node(i, x, 550.0, Color::Green, NodeType::Circle, 12));
        }
        let plain = plan_move(&state, &content.constants, Color::Green).unwrap();
        let hint = suggest_hint(&state, &content.constants, Color::Green).unwrap();
        assert_eq!(plain.kind, MoveKind::Attack);
        assert_eq!((plain.source, plain.target), (NodeId(4), RED_NODE));
        assert_eq!((hint.source, hint.target), (plain.source, plain.target));
        // Lead of 3 adds the dominance bonus; no green node is within 150 of red.
        assert!((hint.score - plain.score - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_ai_controller_respects_turn_gate() {
        let content = base_content();
        let mut state = cell_core::test_fixtures::gated_state(
            &content,
            cell_core::MatchMode::LocalTwoPlayer,
        );
        state.nodes[GREEN_NODE.0].units = 3;
        let mut ai = AiController { color: Color::Red };
        let mut next_id = 0;
        assert!(ai.generate_commands(&state, &content, &mut next_id).is_empty());

        state.turn.advance();
        let commands = ai.generate_commands(&state, &content, &mut next_id);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].origin, Origin::Ai);
        assert_eq!(commands[0].id.0, "cmd_000000");
        assert_eq!(next_id, 1);
    }
}
