//! Server handles.
//!
//! # Responsibilities
//! - Represent one backend server within a balancer
//! - Track in-flight requests with lock-free atomics
//! - Keep a bounded window of recent response-time samples
//!
//! # Design Decisions
//! - The wrapped handler is opaque; a handle imposes no contract on it
//! - The sample window has fixed capacity, so stale measurements decay
//!   naturally as the buffer wraps

use crate::http::handler::RequestHandler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Capacity of the response-time ring buffer.
const SAMPLE_CAPACITY: usize = 100;

/// Fixed-capacity ring of response-time samples with a running sum, giving
/// O(1) average computation under a bounded memory footprint.
#[derive(Debug)]
struct LatencyWindow {
    samples: Vec<f64>,
    next: usize,
    sum: f64,
}

impl LatencyWindow {
    fn new() -> Self {
        Self {
            samples: Vec::with_capacity(SAMPLE_CAPACITY),
            next: 0,
            sum: 0.0,
        }
    }

    fn record(&mut self, sample_ms: f64) {
        if self.samples.len() < SAMPLE_CAPACITY {
            self.samples.push(sample_ms);
        } else {
            self.sum -= self.samples[self.next];
            self.samples[self.next] = sample_ms;
        }
        self.sum += sample_ms;
        self.next = (self.next + 1) % SAMPLE_CAPACITY;
    }

    fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum / self.samples.len() as f64)
        }
    }
}

/// One backend server within a balancer.
///
/// Cheap to share: the handle is held behind an `Arc` by the balancer, the
/// active strategy, and the sticky resolver at the same time.
pub struct ServerHandle {
    name: String,
    weight: f64,
    handler: Arc<dyn RequestHandler>,
    inflight: AtomicUsize,
    latency: Mutex<LatencyWindow>,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("inflight", &self.inflight.load(Ordering::Relaxed))
            .finish()
    }
}

impl ServerHandle {
    /// Create a handle. Callers must have rejected non-positive weights.
    pub fn new(name: impl Into<String>, handler: Arc<dyn RequestHandler>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            handler,
            inflight: AtomicUsize::new(0),
            latency: Mutex::new(LatencyWindow::new()),
        }
    }

    /// Server name, unique within its balancer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured weight (always positive).
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The wrapped request handler.
    pub fn handler(&self) -> &Arc<dyn RequestHandler> {
        &self.handler
    }

    /// Number of requests currently being served by this handle.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }

    /// Increment the in-flight counter; the returned guard decrements it
    /// on drop, whatever way the handler call ends.
    pub fn begin_request(self: &Arc<Self>) -> InflightGuard {
        self.inflight.fetch_add(1, Ordering::Relaxed);
        InflightGuard {
            server: Arc::clone(self),
        }
    }

    /// Record one time-to-first-byte sample.
    pub fn observe_response_time(&self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.latency
            .lock()
            .expect("latency window lock poisoned")
            .record(ms);
    }

    /// Average of the recorded samples in milliseconds; `None` until the
    /// first sample lands.
    pub fn average_response_ms(&self) -> Option<f64> {
        self.latency
            .lock()
            .expect("latency window lock poisoned")
            .average()
    }
}

/// RAII guard keeping the in-flight count honest across panics and
/// client disconnects.
pub struct InflightGuard {
    server: Arc<ServerHandle>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.server.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}
