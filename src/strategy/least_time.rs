//! Least response time.
//!
//! Scores every healthy handle as
//! `average_response_ms * (1 + inflight) / weight` over its bounded sample
//! window. A handle with no samples scores 0 and is preferred until
//! measured, a deliberate cold-start bias toward trying new servers. When
//! several handles tie at the minimum, a private EDF round robin nested in
//! this strategy breaks the tie by weight.

use super::wrr::EdfScheduler;
use super::Strategy;
use crate::balancer::handle::ServerHandle;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct LtState {
    servers: Vec<Arc<ServerHandle>>,
    healthy: HashSet<String>,
    edf: EdfScheduler,
}

/// Least-response-time strategy.
pub struct LeastResponseTime {
    state: Mutex<LtState>,
}

impl LeastResponseTime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LtState {
                servers: Vec::new(),
                healthy: HashSet::new(),
                edf: EdfScheduler::new(),
            }),
        }
    }

    fn score(server: &ServerHandle) -> f64 {
        let avg_ms = server.average_response_ms().unwrap_or(0.0);
        avg_ms * (1.0 + server.inflight() as f64) / server.weight()
    }
}

impl Default for LeastResponseTime {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for LeastResponseTime {
    fn name(&self) -> &'static str {
        "least-time"
    }

    fn add(&self, server: Arc<ServerHandle>) {
        let mut state = self.state.lock().expect("least-time state lock poisoned");
        state.healthy.insert(server.name().to_string());
        state.edf.insert(Arc::clone(&server));
        state.servers.push(server);
    }

    fn set_up(&self, name: &str, up: bool) {
        let mut state = self.state.lock().expect("least-time state lock poisoned");
        if !state.servers.iter().any(|s| s.name() == name) {
            return;
        }
        if up {
            state.healthy.insert(name.to_string());
        } else {
            state.healthy.remove(name);
        }
    }

    fn next_server(&self) -> Option<Arc<ServerHandle>> {
        let mut state = self.state.lock().expect("least-time state lock poisoned");

        let mut min = f64::INFINITY;
        let mut tied: Vec<Arc<ServerHandle>> = Vec::new();
        for server in &state.servers {
            if !state.healthy.contains(server.name()) {
                continue;
            }
            let score = Self::score(server);
            match score.total_cmp(&min) {
                std::cmp::Ordering::Less => {
                    min = score;
                    tied.clear();
                    tied.push(Arc::clone(server));
                }
                std::cmp::Ordering::Equal => tied.push(Arc::clone(server)),
                std::cmp::Ordering::Greater => {}
            }
        }

        match tied.len() {
            0 => None,
            1 => tied.pop(),
            // Weighted round robin among the tied handles; other handles
            // rotate through the heap without being returned.
            _ => loop {
                let server = state.edf.advance()?;
                if tied.iter().any(|t| t.name() == server.name()) {
                    return Some(server);
                }
            },
        }
    }

    fn record(&self, server: &Arc<ServerHandle>, ttfb: Duration) {
        server.observe_response_time(ttfb);
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .expect("least-time state lock poisoned")
            .servers
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::{HttpRequest, HttpResponse, RequestHandler};
    use axum::body::Body;

    fn server(name: &str, weight: f64) -> Arc<ServerHandle> {
        let handler: Arc<dyn RequestHandler> =
            Arc::new(|_req: HttpRequest| async { HttpResponse::new(Body::empty()) });
        Arc::new(ServerHandle::new(name, handler, weight))
    }

    #[test]
    fn test_cold_server_preferred_until_measured() {
        let lt = LeastResponseTime::new();
        let warm = server("warm", 1.0);
        let cold = server("cold", 1.0);
        warm.observe_response_time(Duration::from_millis(5));
        lt.add(Arc::clone(&warm));
        lt.add(Arc::clone(&cold));

        for _ in 0..5 {
            assert_eq!(lt.next_server().unwrap().name(), "cold");
        }

        // Once measured slower than the warm server, it ranks by speed.
        cold.observe_response_time(Duration::from_millis(50));
        assert_eq!(lt.next_server().unwrap().name(), "warm");
    }

    #[test]
    fn test_inflight_inflates_score() {
        let lt = LeastResponseTime::new();
        let a = server("a", 1.0);
        let b = server("b", 1.0);
        a.observe_response_time(Duration::from_millis(10));
        b.observe_response_time(Duration::from_millis(10));
        let _guard = a.begin_request();
        lt.add(Arc::clone(&a));
        lt.add(Arc::clone(&b));

        assert_eq!(lt.next_server().unwrap().name(), "b");
    }

    #[test]
    fn test_weight_divides_score() {
        let lt = LeastResponseTime::new();
        let heavy = server("heavy", 10.0);
        let light = server("light", 1.0);
        heavy.observe_response_time(Duration::from_millis(20));
        light.observe_response_time(Duration::from_millis(10));
        lt.add(Arc::clone(&heavy));
        lt.add(Arc::clone(&light));

        // 20 / 10 = 2 beats 10 / 1 = 10.
        assert_eq!(lt.next_server().unwrap().name(), "heavy");
    }

    #[test]
    fn test_all_cold_ties_break_by_weighted_round_robin() {
        let lt = LeastResponseTime::new();
        lt.add(server("a", 3.0));
        lt.add(server("b", 1.0));

        let mut a = 0;
        for _ in 0..40 {
            if lt.next_server().unwrap().name() == "a" {
                a += 1;
            }
        }
        assert!((29..=31).contains(&a), "weighted tie-break off: a picked {a}/40");
    }

    #[test]
    fn test_down_handles_excluded() {
        let lt = LeastResponseTime::new();
        lt.add(server("a", 1.0));
        lt.add(server("b", 1.0));
        lt.set_up("a", false);

        for _ in 0..10 {
            assert_eq!(lt.next_server().unwrap().name(), "b");
        }
        lt.set_up("b", false);
        assert!(lt.next_server().is_none());
    }
}
