use super::*;
use crate::test_fixtures::{base_content, cmd, duel_state, gated_state, GREEN_NODE, RED_NODE};


// --- Shared test helpers ------------------------------------------------

fn test_content() -> MatchContent {
    base_content()
}

fn connect(issued_by: Color, origin: Origin, from: NodeId, to: NodeId) -> CommandEnvelope {
    cmd(issued_by, origin, 0, Command::Connect { from, to })
}

fn remote(payload: &str) -> CommandEnvelope {
    cmd(
        Color::Green,
        Origin::Network,
        0,
        Command::RemoteMove {
            payload: payload.as_bytes().to_vec(),
        },
    )
}

fn run_ticks(
    state: &mut MatchState,
    content: &MatchContent,
    count: u32,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..count {
        events.extend(tick(state, &[], content, event_level));
    }
    events
}

fn count_events(events: &[EventEnvelope], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| pred(&e.event)).count()
}

/// Ticks needed for the simulated clock to pass `ms`.
fn ticks_for_ms(content: &MatchContent, ms: u64) -> u32 {
    u32::try_from(ms / content.constants.tick_ms + 1).unwrap()
}
