use std::path::PathBuf;
use std::sync::Arc;

use cell_control::{AiController, CommandSource};
use cell_core::{
    ArbiterMode, Color, Command, CommandEnvelope, CommandId, Event, EventEnvelope, EventLevel, MatchContent,
    MatchHistory, MatchState, Origin,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::network::NetworkLink;

pub struct SimState {
    pub match_state: MatchState,
    pub content: MatchContent,
    pub ai: Vec<AiController>,
    pub network: Option<NetworkLink>,
    /// Applied on the next tick.
    pub pending: Vec<CommandEnvelope>,
    pub next_command_id: u64,
    pub event_level: EventLevel,
    pub history_out: Option<PathBuf>,
    pub final_history: Option<MatchHistory>,
}

pub type SharedSim = Arc<Mutex<SimState>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub event_tx: EventTx,
    pub ticks_per_sec: f64,
}

impl SimState {
    pub fn new(match_state: MatchState, content: MatchContent) -> Self {
        let ai = match_state
            .setup
            .ai_colors
            .iter()
            .map(|&color| AiController { color })
            .collect();
        Self {
            match_state,
            content,
            ai,
            network: None,
            pending: Vec::new(),
            next_command_id: 0,
            event_level: EventLevel::Normal,
            history_out: None,
            final_history: None,
        }
    }

    /// Side whose moves this daemon accepts over HTTP. Hot-seat play, and a
    /// networked match that lost its peer, hand the input to whoever holds
    /// the turn.
    pub fn input_side(&self) -> Color {
        let turn = &self.match_state.turn;
        let fixed = match turn.mode {
            ArbiterMode::LocalAlternating => None,
            ArbiterMode::Free | ArbiterMode::NetworkedAlternating { .. } => {
                self.match_state.setup.perspective
            }
        };
        fixed
            .or_else(|| turn.current_player())
            .unwrap_or(Color::Green)
    }

    /// Queues a command from the local player and returns its id.
    pub fn submit(&mut self, command: Command) -> CommandId {
        let id = CommandId(format!("cmd_{:06}", self.next_command_id));
        self.next_command_id += 1;
        self.pending.push(CommandEnvelope {
            id: id.clone(),
            issued_by: self.input_side(),
            origin: Origin::Player,
            issued_tick: self.match_state.meta.tick,
            command,
        });
        id
    }

    /// Runs one tick and reacts to what it produced: forwards outbound moves
    /// to the peer, lets woken planners queue their move, and records the
    /// history once the match ends.
    pub fn step(&mut self) -> Vec<EventEnvelope> {
        if let Some(link) = &self.network {
            let inbound = link.drain(self.match_state.meta.tick, &mut self.next_command_id);
            self.pending.extend(inbound);
        }
        let commands = std::mem::take(&mut self.pending);
        let events = cell_core::tick(
            &mut self.match_state,
            &commands,
            &self.content,
            self.event_level,
        );

        for event in &events {
            match &event.event {
                Event::OutboundMove { payload } => self.forward(payload),
                Event::PlannerWake { color } => self.wake_planner(*color),
                Event::NetworkDegraded => {
                    tracing::warn!("peer lost, continuing as local alternating play");
                    if let Some(mut link) = self.network.take() {
                        link.shutdown();
                    }
                }
                Event::MatchEnded { outcome, history } => {
                    tracing::info!(
                        title = %outcome.title,
                        winner = %outcome.winner(),
                        moves = history.events.len(),
                        "match ended: {}",
                        outcome.message
                    );
                    self.record(history);
                }
                _ => {}
            }
        }
        events
    }

    fn forward(&mut self, payload: &str) {
        let Some(link) = &self.network else {
            return;
        };
        if let Err(err) = link.send_move(payload) {
            tracing::warn!("sending move failed: {err}");
            let id = CommandId(format!("cmd_{:06}", self.next_command_id));
            self.next_command_id += 1;
            self.pending.push(CommandEnvelope {
                id,
                issued_by: self.input_side(),
                origin: Origin::Network,
                issued_tick: self.match_state.meta.tick,
                command: Command::TransportLost,
            });
        }
    }

    fn wake_planner(&mut self, color: Color) {
        for ai in self.ai.iter_mut().filter(|ai| ai.color == color) {
            let commands =
                ai.generate_commands(&self.match_state, &self.content, &mut self.next_command_id);
            self.pending.extend(commands);
        }
    }

    fn record(&mut self, history: &MatchHistory) {
        self.final_history = Some(history.clone());
        if let Some(path) = &self.history_out {
            match cell_world::save_history(path, history) {
                Ok(()) => tracing::info!("history written to {}", path.display()),
                Err(err) => tracing::error!("saving history failed: {err:#}"),
            }
        }
        if let Some(mut link) = self.network.take() {
            link.shutdown();
        }
    }
}
