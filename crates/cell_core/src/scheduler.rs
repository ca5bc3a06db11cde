//! Discrete-event scheduler.
//!
//! Every periodic source in a match (production, connection emission, unit
//! movement, round clock, turn timeout, AI planner wake-up) is a `Timer` in one
//! queue ordered by fire time, ties broken by insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::{Color, ConnectionId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timer {
    Movement,
    RoundClock,
    Production(NodeId),
    ConnectionEmit(ConnectionId),
    /// Stamped with the turn it was armed for; stale stamps are ignored.
    TurnTimeout { turn_number: u64 },
    PlannerWake(Color),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTimer {
    pub at_ms: u64,
    pub seq: u64,
    pub timer: Timer,
}

// Reversed so `BinaryHeap` pops the earliest timer first.
impl Ord for ScheduledTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at_ms
            .cmp(&self.at_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    queue: BinaryHeap<ScheduledTimer>,
    next_seq: u64,
    stopped: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `timer` to fire at `at_ms`. No-op once the scheduler is stopped.
    pub fn schedule(&mut self, at_ms: u64, timer: Timer) {
        if self.stopped {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledTimer { at_ms, seq, timer });
    }

    /// Pops the earliest timer due at or before `until_ms`.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<ScheduledTimer> {
        if self.queue.peek()?.at_ms <= until_ms {
            self.queue.pop()
        } else {
            None
        }
    }

    pub fn next_fire_ms(&self) -> Option<u64> {
        self.queue.peek().map(|t| t.at_ms)
    }

    /// Drops every pending timer and refuses new ones. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, timer: Timer) -> bool {
        self.queue.iter().any(|t| t.timer == timer)
    }
}
