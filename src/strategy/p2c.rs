//! Power of two random choices.
//!
//! Draw two distinct random healthy handles, keep the one with fewer
//! requests in flight. No weighting state, O(1) per pick, and health
//! transitions move handles between the healthy and unhealthy collections
//! in O(1) via swap-with-last-and-pop.

use super::Strategy;
use crate::balancer::handle::ServerHandle;
use std::sync::{Arc, Mutex};

/// Healthy/unhealthy split shared by the two P2C-shaped strategies.
pub(crate) struct Partition {
    healthy: Vec<Arc<ServerHandle>>,
    unhealthy: Vec<Arc<ServerHandle>>,
}

impl Partition {
    pub(crate) fn new() -> Self {
        Self {
            healthy: Vec::new(),
            unhealthy: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, server: Arc<ServerHandle>) {
        self.healthy.push(server);
    }

    pub(crate) fn set_up(&mut self, name: &str, up: bool) {
        let (from, to) = if up {
            (&mut self.unhealthy, &mut self.healthy)
        } else {
            (&mut self.healthy, &mut self.unhealthy)
        };
        if let Some(idx) = from.iter().position(|s| s.name() == name) {
            let server = from.swap_remove(idx);
            to.push(server);
        }
    }

    pub(crate) fn healthy(&self) -> &[Arc<ServerHandle>] {
        &self.healthy
    }

    pub(crate) fn len(&self) -> usize {
        self.healthy.len() + self.unhealthy.len()
    }

    /// Two distinct random indices into the healthy collection; the second
    /// draw is conditioned to differ from the first, then wrapped.
    /// Requires at least two healthy handles.
    pub(crate) fn draw_two(&self) -> (usize, usize) {
        let n = self.healthy.len();
        let first = fastrand::usize(..n);
        let mut second = fastrand::usize(..n - 1);
        if second >= first {
            second += 1;
        }
        (first, second)
    }
}

/// P2C strategy on in-flight counts.
pub struct PowerOfTwoChoices {
    state: Mutex<Partition>,
}

impl PowerOfTwoChoices {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Partition::new()),
        }
    }
}

impl Default for PowerOfTwoChoices {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for PowerOfTwoChoices {
    fn name(&self) -> &'static str {
        "p2c"
    }

    fn add(&self, server: Arc<ServerHandle>) {
        self.state
            .lock()
            .expect("p2c state lock poisoned")
            .add(server);
    }

    fn set_up(&self, name: &str, up: bool) {
        self.state
            .lock()
            .expect("p2c state lock poisoned")
            .set_up(name, up);
    }

    fn next_server(&self) -> Option<Arc<ServerHandle>> {
        let state = self.state.lock().expect("p2c state lock poisoned");
        match state.healthy().len() {
            0 => None,
            1 => Some(Arc::clone(&state.healthy()[0])),
            _ => {
                let (first, second) = state.draw_two();
                let a = &state.healthy()[first];
                let b = &state.healthy()[second];
                // Ties keep the first draw.
                if b.inflight() < a.inflight() {
                    Some(Arc::clone(b))
                } else {
                    Some(Arc::clone(a))
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.state.lock().expect("p2c state lock poisoned").len()
    }
}
