//! Actor Mortality Tracker.
//!
//! Freshly-killed actors cannot be looted until the host settles their
//! death state. The tracker buffers them in a capacity-bounded FIFO and
//! releases each exactly once after a fixed wait. An actor that was never
//! seen alive this visit was already dead on first sight; it skips the
//! delay entirely.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use world_model::{RefHandle, RefId};

/// One buffered death.
#[derive(Debug, Clone, Copy)]
struct MortalityRecord {
    handle: RefHandle,
    died_at: Instant,
}

/// Capacity-bounded FIFO of recently-killed actors.
#[derive(Debug)]
pub struct MortalityTracker {
    queue: VecDeque<MortalityRecord>,
    /// Ids currently buffered; consulted by the candidate filter
    pending: HashSet<RefId>,
    /// Actors observed alive this visit
    seen_alive: HashSet<RefId>,
    capacity: usize,
}

impl MortalityTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            pending: HashSet::new(),
            seen_alive: HashSet::new(),
            capacity,
        }
    }

    /// Notes that the filter saw this actor alive.
    pub fn note_alive(&mut self, handle: RefHandle) {
        self.seen_alive.insert(handle.id);
    }

    /// Buffers a death. An actor never seen alive this visit skips the
    /// delay; one seen alive goes through it exactly once.
    pub fn record(&mut self, handle: RefHandle, now: Instant) {
        if !self.seen_alive.remove(&handle.id) {
            tracing::debug!("{} was dead on first sight, releasing immediately", handle);
            return;
        }
        if self.pending.contains(&handle.id) {
            return;
        }
        if self.queue.len() >= self.capacity {
            if let Some(dropped) = self.queue.pop_front() {
                self.pending.remove(&dropped.handle.id);
                tracing::debug!("mortality buffer full, dropping {}", dropped.handle);
            }
        }
        self.pending.insert(handle.id);
        self.queue.push_back(MortalityRecord {
            handle,
            died_at: now,
        });
    }

    /// Whether a corpse is still waiting out its delay.
    pub fn is_pending(&self, id: RefId) -> bool {
        self.pending.contains(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Releases every record older than the wait interval into `out`,
    /// each exactly once.
    pub fn release_due(&mut self, now: Instant, interval: Duration, out: &mut Vec<RefHandle>) {
        while let Some(front) = self.queue.front() {
            if now.duration_since(front.died_at) <= interval {
                break;
            }
            let record = self.queue.pop_front().expect("front exists");
            self.pending.remove(&record.handle.id);
            out.push(record.handle);
        }
    }

    /// Cell change: "seen alive" notes belong to the old visit.
    pub fn on_cell_change(&mut self) {
        self.seen_alive.clear();
    }

    pub fn on_world_reload(&mut self) {
        self.queue.clear();
        self.pending.clear();
        self.seen_alive.clear();
    }
}
