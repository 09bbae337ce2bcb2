//! Weighted round robin via earliest-deadline-first scheduling.
//!
//! Every handle carries a floating-point deadline; picking the next server
//! pops the globally smallest deadline, advances the watermark there, and
//! re-inserts the handle one `1/weight` stride later. The result is
//! weighted round robin with fractional weights in O(log n) per pick and
//! low-variance interleaving from the very first request.

use super::Strategy;
use crate::balancer::handle::ServerHandle;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Mutex};

/// One heap entry: a handle and its current deadline.
struct EdfEntry {
    deadline: f64,
    server: Arc<ServerHandle>,
}

impl PartialEq for EdfEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline.total_cmp(&other.deadline).is_eq()
    }
}

impl Eq for EdfEntry {}

impl PartialOrd for EdfEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdfEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline.total_cmp(&other.deadline)
    }
}

/// Private EDF priority structure.
///
/// Exposes insertion and single-step rotation only; the heap itself never
/// leaks through the [`Strategy`] surface. Also embedded by the least-time
/// strategy for its tie-breaking.
pub(crate) struct EdfScheduler {
    heap: BinaryHeap<Reverse<EdfEntry>>,
    cur_deadline: f64,
}

impl EdfScheduler {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cur_deadline: 0.0,
        }
    }

    /// Insert a handle one stride past the current watermark: a fair
    /// starting position, neither a head start nor a penalty.
    pub(crate) fn insert(&mut self, server: Arc<ServerHandle>) {
        let deadline = self.cur_deadline + 1.0 / server.weight();
        self.heap.push(Reverse(EdfEntry { deadline, server }));
    }

    /// Pop the handle with the smallest deadline, advance the watermark to
    /// it, and re-insert the handle one stride later. Every call rotates
    /// exactly one handle, healthy or not.
    pub(crate) fn advance(&mut self) -> Option<Arc<ServerHandle>> {
        let Reverse(mut entry) = self.heap.pop()?;
        self.cur_deadline = entry.deadline;
        entry.deadline = self.cur_deadline + 1.0 / entry.server.weight();
        let server = Arc::clone(&entry.server);
        self.heap.push(Reverse(entry));
        Some(server)
    }
}

struct WrrState {
    edf: EdfScheduler,
    members: HashSet<String>,
    healthy: HashSet<String>,
}

/// Weighted round robin strategy.
pub struct WeightedRoundRobin {
    state: Mutex<WrrState>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WrrState {
                edf: EdfScheduler::new(),
                members: HashSet::new(),
                healthy: HashSet::new(),
            }),
        }
    }
}

impl Default for WeightedRoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for WeightedRoundRobin {
    fn name(&self) -> &'static str {
        "wrr"
    }

    fn add(&self, server: Arc<ServerHandle>) {
        let mut state = self.state.lock().expect("wrr state lock poisoned");
        state.members.insert(server.name().to_string());
        state.healthy.insert(server.name().to_string());
        state.edf.insert(server);
    }

    fn set_up(&self, name: &str, up: bool) {
        let mut state = self.state.lock().expect("wrr state lock poisoned");
        if !state.members.contains(name) {
            return;
        }
        if up {
            state.healthy.insert(name.to_string());
        } else {
            state.healthy.remove(name);
        }
    }

    fn next_server(&self) -> Option<Arc<ServerHandle>> {
        let mut state = self.state.lock().expect("wrr state lock poisoned");
        if state.healthy.is_empty() {
            return None;
        }
        // Unhealthy handles keep rotating so they do not monopolize future
        // picks once they recover; their deadlines strictly increase, so a
        // healthy handle becomes the minimum after finitely many steps.
        loop {
            let server = state.edf.advance()?;
            if state.healthy.contains(server.name()) {
                return Some(server);
            }
        }
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .expect("wrr state lock poisoned")
            .members
            .len()
    }
}
