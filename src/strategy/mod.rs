//! Selection strategies.
//!
//! # Data Flow
//! ```text
//! Balancer::add → strategy.add (healthy, non-fenced handles only)
//! Balancer::set_status → strategy.set_up
//! Balancer::dispatch → strategy.next_server
//! request completion → strategy.record (latency-aware strategies)
//! ```
//!
//! # Design Decisions
//! - One capability trait, four interchangeable implementations, chosen at
//!   balancer construction
//! - Each strategy owns its scheduling state behind its own lock, separate
//!   from the balancer's handler-set lock
//! - Fenced handles never reach a strategy; sticky traffic to them flows
//!   through the balancer directly

pub mod least_time;
pub mod p2c;
pub mod peak_ewma;
pub mod wrr;

use crate::balancer::handle::ServerHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use least_time::LeastResponseTime;
pub use p2c::PowerOfTwoChoices;
pub use peak_ewma::{EwmaRegistry, PeakEwma};
pub use wrr::WeightedRoundRobin;

/// A pure selection algorithm over a set of server handles.
pub trait Strategy: Send + Sync {
    /// Stable algorithm name, used in logs and config.
    fn name(&self) -> &'static str;

    /// Register a handle. Newly added handles start healthy.
    fn add(&self, server: Arc<ServerHandle>);

    /// Toggle a handle's health. Unknown names are ignored.
    fn set_up(&self, name: &str, up: bool);

    /// Pick the next server among the currently healthy handles, or `None`
    /// when every handle is down.
    fn next_server(&self) -> Option<Arc<ServerHandle>>;

    /// Feed one time-to-first-byte observation back into the algorithm.
    /// Only latency-aware strategies care.
    fn record(&self, server: &Arc<ServerHandle>, ttfb: Duration) {
        let _ = (server, ttfb);
    }

    /// Number of registered handles, healthy or not.
    fn len(&self) -> usize;

    /// True when no handle is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which algorithm a balancer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Weighted round robin via earliest-deadline-first.
    #[default]
    Wrr,
    /// Power of two random choices on in-flight counts.
    P2c,
    /// P2C weighted by a decayed peak-EWMA latency estimate.
    PeakEwma,
    /// Lowest average response time, EDF tie-break.
    LeastTime,
}

impl StrategyKind {
    /// Instantiate the algorithm. `registry` is only consulted by
    /// [`StrategyKind::PeakEwma`]; passing `None` there gives the balancer
    /// a private registry that will not survive reconstruction.
    pub fn build(self, registry: Option<Arc<EwmaRegistry>>) -> Box<dyn Strategy> {
        match self {
            Self::Wrr => Box::new(WeightedRoundRobin::new()),
            Self::P2c => Box::new(PowerOfTwoChoices::new()),
            Self::PeakEwma => {
                let registry = registry.unwrap_or_else(|| Arc::new(EwmaRegistry::new()));
                Box::new(PeakEwma::new(registry))
            }
            Self::LeastTime => Box::new(LeastResponseTime::new()),
        }
    }
}
