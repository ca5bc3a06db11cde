use crate::state::{EventTx, SharedSim};
use std::time::Duration;

/// Drives the match until it ends or `max_ticks` is reached.
pub async fn run_tick_loop(
    sim: SharedSim,
    event_tx: EventTx,
    ticks_per_sec: f64,
    max_ticks: Option<u64>,
) {
    let mut interval = if ticks_per_sec > 0.0 {
        let mut iv = tokio::time::interval(Duration::from_secs_f64(1.0 / ticks_per_sec));
        iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
        Some(iv)
    } else {
        None
    };

    loop {
        let (events, done) = {
            let mut guard = sim.lock();
            let events = guard.step();
            let state = &guard.match_state;
            let done = state.outcome.is_some()
                || max_ticks.is_some_and(|max| state.meta.tick >= max);
            (events, done)
        };

        let _ = event_tx.send(events);

        if done {
            tracing::info!("tick loop stopped");
            break;
        }

        if let Some(ref mut iv) = interval {
            iv.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}
