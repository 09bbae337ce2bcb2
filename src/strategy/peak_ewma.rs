//! Peak-EWMA-weighted power of two choices.
//!
//! Each server carries a latency estimate that decays continuously:
//! `ewma' = ewma * exp(-Δt/τ) + sample * (1 - exp(-Δt/τ))`, where Δt is
//! wall-clock time since the value was last touched. An idle server's
//! estimate fades toward zero with no background timer. Selection draws
//! two distinct random healthy handles and keeps the lower decayed score.
//!
//! Estimates live in an [`EwmaRegistry`] keyed by server name and owned
//! outside any one balancer, so learned latency survives balancer
//! reconstruction on a configuration reload.

use super::p2c::Partition;
use super::Strategy;
use crate::balancer::handle::ServerHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Default decay constant τ (half-life ≈ 6.93 s).
const DEFAULT_DECAY: Duration = Duration::from_secs(10);

/// Registry entries untouched for this long are pruned.
const ENTRY_TTL: Duration = Duration::from_secs(60);

/// Added to the seed of a freshly referenced server so it does not look
/// infinitely fast and absorb all traffic at once.
const STARTUP_PENALTY_MS: f64 = 5.0;

/// Prune the registry every this many observations.
const PRUNE_EVERY: u64 = 128;

/// One server's latency estimate. Value bits and touch time are lock-free
/// atomics because they are updated on every request completion.
struct EwmaEntry {
    /// f64 bits of the estimate in milliseconds.
    value_bits: AtomicU64,
    /// Nanoseconds since the registry epoch at the last touch.
    touched_nanos: AtomicU64,
}

impl EwmaEntry {
    fn new(value_ms: f64, now_nanos: u64) -> Self {
        Self {
            value_bits: AtomicU64::new(value_ms.to_bits()),
            touched_nanos: AtomicU64::new(now_nanos),
        }
    }

    fn decayed(&self, now_nanos: u64, tau_secs: f64) -> f64 {
        let value = f64::from_bits(self.value_bits.load(Ordering::Acquire));
        let touched = self.touched_nanos.load(Ordering::Acquire);
        let dt_secs = now_nanos.saturating_sub(touched) as f64 / 1e9;
        value * (-dt_secs / tau_secs).exp()
    }

    fn observe(&self, sample_ms: f64, now_nanos: u64, tau_secs: f64) {
        let mut current = self.value_bits.load(Ordering::Acquire);
        loop {
            let touched = self.touched_nanos.load(Ordering::Acquire);
            let dt_secs = now_nanos.saturating_sub(touched) as f64 / 1e9;
            let keep = (-dt_secs / tau_secs).exp();
            let next = f64::from_bits(current) * keep + sample_ms * (1.0 - keep);
            match self.value_bits.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.touched_nanos.store(now_nanos, Ordering::Release);
                    break;
                }
                Err(updated) => current = updated,
            }
        }
    }
}

/// Process-wide latency knowledge, independent of any single balancer.
///
/// Explicitly owned and injected, not a hidden singleton: construct one,
/// share it via `Arc` with every balancer that opts into peak-EWMA.
pub struct EwmaRegistry {
    entries: RwLock<HashMap<String, Arc<EwmaEntry>>>,
    epoch: Instant,
    tau_secs: f64,
    observations: AtomicU64,
}

impl EwmaRegistry {
    /// Registry with the default 10 s decay constant.
    pub fn new() -> Self {
        Self::with_decay(DEFAULT_DECAY)
    }

    /// Registry with a custom decay constant. Short constants make the
    /// estimate forget quickly; tests use millisecond values.
    pub fn with_decay(tau: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            epoch: Instant::now(),
            tau_secs: tau.as_secs_f64().max(f64::MIN_POSITIVE),
            observations: AtomicU64::new(0),
        }
    }

    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Current decayed-to-now score for a server; unknown names score 0.
    pub fn score(&self, name: &str) -> f64 {
        let entries = self.entries.read().expect("ewma registry lock poisoned");
        match entries.get(name) {
            Some(entry) => entry.decayed(self.now_nanos(), self.tau_secs),
            None => 0.0,
        }
    }

    /// Record one latency sample for a server, creating its entry on first
    /// reference.
    pub fn observe(&self, name: &str, sample: Duration) {
        self.maybe_prune();
        let sample_ms = sample.as_secs_f64() * 1000.0;
        let now = self.now_nanos();

        let entry = {
            let entries = self.entries.read().expect("ewma registry lock poisoned");
            entries.get(name).cloned()
        };
        match entry {
            Some(entry) => entry.observe(sample_ms, now, self.tau_secs),
            None => {
                let mut entries = self.entries.write().expect("ewma registry lock poisoned");
                entries
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(EwmaEntry::new(sample_ms, now)));
            }
        }
    }

    /// Seed an entry for a newly added server: the average of the already
    /// known estimates plus a fixed startup penalty. Known names keep
    /// their learned estimate.
    pub fn seed(&self, name: &str) {
        let now = self.now_nanos();
        let mut entries = self.entries.write().expect("ewma registry lock poisoned");
        if entries.contains_key(name) {
            return;
        }
        let mean = if entries.is_empty() {
            0.0
        } else {
            entries
                .values()
                .map(|e| e.decayed(now, self.tau_secs))
                .sum::<f64>()
                / entries.len() as f64
        };
        entries.insert(
            name.to_string(),
            Arc::new(EwmaEntry::new(mean + STARTUP_PENALTY_MS, now)),
        );
    }

    /// Number of tracked servers.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("ewma registry lock poisoned")
            .len()
    }

    /// True when nothing has been tracked yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn maybe_prune(&self) {
        let n = self.observations.fetch_add(1, Ordering::Relaxed) + 1;
        if n % PRUNE_EVERY != 0 {
            return;
        }
        let cutoff = self.now_nanos().saturating_sub(ENTRY_TTL.as_nanos() as u64);
        let mut entries = self.entries.write().expect("ewma registry lock poisoned");
        entries.retain(|_, entry| entry.touched_nanos.load(Ordering::Acquire) >= cutoff);
    }
}

impl Default for EwmaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak-EWMA strategy: P2C draws scored by decayed latency.
pub struct PeakEwma {
    registry: Arc<EwmaRegistry>,
    state: Mutex<Partition>,
}

impl PeakEwma {
    pub fn new(registry: Arc<EwmaRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(Partition::new()),
        }
    }

    /// The shared registry backing this strategy.
    pub fn registry(&self) -> &Arc<EwmaRegistry> {
        &self.registry
    }
}

impl Strategy for PeakEwma {
    fn name(&self) -> &'static str {
        "peak-ewma"
    }

    fn add(&self, server: Arc<ServerHandle>) {
        self.registry.seed(server.name());
        self.state
            .lock()
            .expect("peak-ewma state lock poisoned")
            .add(server);
    }

    fn set_up(&self, name: &str, up: bool) {
        self.state
            .lock()
            .expect("peak-ewma state lock poisoned")
            .set_up(name, up);
    }

    fn next_server(&self) -> Option<Arc<ServerHandle>> {
        let state = self.state.lock().expect("peak-ewma state lock poisoned");
        match state.healthy().len() {
            0 => None,
            1 => Some(Arc::clone(&state.healthy()[0])),
            _ => {
                let (first, second) = state.draw_two();
                let a = &state.healthy()[first];
                let b = &state.healthy()[second];
                // Ties keep the first draw.
                if self.registry.score(b.name()) < self.registry.score(a.name()) {
                    Some(Arc::clone(b))
                } else {
                    Some(Arc::clone(a))
                }
            }
        }
    }

    fn record(&self, server: &Arc<ServerHandle>, ttfb: Duration) {
        self.registry.observe(server.name(), ttfb);
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .expect("peak-ewma state lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::{HttpRequest, HttpResponse, RequestHandler};
    use axum::body::Body;

    fn server(name: &str) -> Arc<ServerHandle> {
        let handler: Arc<dyn RequestHandler> =
            Arc::new(|_req: HttpRequest| async { HttpResponse::new(Body::empty()) });
        Arc::new(ServerHandle::new(name, handler, 1.0))
    }

    #[test]
    fn test_unknown_name_scores_zero() {
        let registry = EwmaRegistry::new();
        assert_eq!(registry.score("nobody"), 0.0);
    }

    #[test]
    fn test_observe_moves_estimate_toward_sample() {
        // Tiny τ: each sample nearly replaces the estimate once any time
        // has passed; with Δt ≈ 0 the estimate barely moves. Either way it
        // stays within the observed range.
        let registry = EwmaRegistry::with_decay(Duration::from_millis(5));
        registry.observe("s", Duration::from_millis(100));
        std::thread::sleep(Duration::from_millis(10));
        registry.observe("s", Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(1));
        let score = registry.score("s");
        assert!(score < 50.0, "estimate did not track new sample: {score}");
    }

    #[test]
    fn test_idle_estimate_decays_toward_zero() {
        let registry = EwmaRegistry::with_decay(Duration::from_millis(5));
        registry.observe("s", Duration::from_millis(100));
        std::thread::sleep(Duration::from_millis(50));
        let score = registry.score("s");
        assert!(score < 1.0, "idle estimate did not decay: {score}");
    }

    #[test]
    fn test_seed_uses_mean_plus_penalty() {
        let registry = EwmaRegistry::with_decay(Duration::from_secs(1000));
        registry.observe("warm", Duration::from_millis(40));
        registry.seed("fresh");
        let fresh = registry.score("fresh");
        assert!(
            fresh > 40.0 && fresh < 50.0,
            "fresh server seeded at {fresh}, expected mean + penalty"
        );
        // Seeding an already known name keeps the estimate.
        registry.seed("warm");
        assert!((registry.score("warm") - 40.0).abs() < 1.0);
    }

    #[test]
    fn test_registry_survives_strategy_reconstruction() {
        let registry = Arc::new(EwmaRegistry::with_decay(Duration::from_secs(1000)));
        {
            let strategy = PeakEwma::new(Arc::clone(&registry));
            let s = server("a");
            strategy.add(Arc::clone(&s));
            strategy.record(&s, Duration::from_millis(80));
        }
        let rebuilt = PeakEwma::new(Arc::clone(&registry));
        rebuilt.add(server("a"));
        assert!(
            rebuilt.registry().score("a") > 10.0,
            "learned latency lost across reconstruction"
        );
    }

    #[test]
    fn test_single_healthy_short_circuits() {
        let strategy = PeakEwma::new(Arc::new(EwmaRegistry::new()));
        strategy.add(server("only"));
        assert_eq!(strategy.next_server().unwrap().name(), "only");
    }

    #[test]
    fn test_prefers_faster_server() {
        let strategy = PeakEwma::new(Arc::new(EwmaRegistry::with_decay(
            Duration::from_millis(100),
        )));
        let fast = server("fast");
        let slow = server("slow");
        strategy.add(Arc::clone(&fast));
        strategy.add(Arc::clone(&slow));

        for _ in 0..5 {
            std::thread::sleep(Duration::from_millis(2));
            strategy.record(&fast, Duration::from_millis(5));
            strategy.record(&slow, Duration::from_millis(200));
        }

        let picks = (0..100)
            .filter(|_| strategy.next_server().unwrap().name() == "fast")
            .count();
        assert!(picks > 60, "fast server drew only {picks}/100");
    }

    #[test]
    fn test_preference_inverts_when_latencies_flip() {
        let strategy = PeakEwma::new(Arc::new(EwmaRegistry::with_decay(
            Duration::from_millis(50),
        )));
        let a = server("a");
        let b = server("b");
        strategy.add(Arc::clone(&a));
        strategy.add(Arc::clone(&b));

        for _ in 0..5 {
            std::thread::sleep(Duration::from_millis(2));
            strategy.record(&a, Duration::from_millis(5));
            strategy.record(&b, Duration::from_millis(200));
        }
        let a_picks = (0..100)
            .filter(|_| strategy.next_server().unwrap().name() == "a")
            .count();
        assert!(a_picks > 60, "a drew only {a_picks}/100 while fast");

        // Latencies flip; with a short τ the old estimates wash out.
        for _ in 0..20 {
            std::thread::sleep(Duration::from_millis(2));
            strategy.record(&a, Duration::from_millis(200));
            strategy.record(&b, Duration::from_millis(5));
        }
        let b_picks = (0..100)
            .filter(|_| strategy.next_server().unwrap().name() == "b")
            .count();
        assert!(b_picks > 60, "b drew only {b_picks}/100 after inversion");
    }
}
