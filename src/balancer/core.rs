//! The balancer bound to one logical service.

use super::error::{BalancerError, BalancerResult};
use super::handle::ServerHandle;
use crate::config::schema::{ServiceConfig, StickyConfig};
use crate::http::handler::{HandlerFuture, HttpRequest, HttpResponse, RequestHandler};
use crate::http::response;
use crate::sticky::resolver::StickyResolver;
use crate::strategy::{EwmaRegistry, Strategy};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// Callback invoked when a balancer's aggregate health flips. Parents
/// register one per child to hear about subtree transitions.
pub type StatusUpdater = Box<dyn Fn(bool) + Send + Sync>;

struct Pool {
    handlers: Vec<Arc<ServerHandle>>,
    by_name: HashMap<String, Arc<ServerHandle>>,
    /// Names currently considered healthy.
    status: HashSet<String>,
    /// Names draining: no new traffic, sticky sessions only.
    fenced: HashSet<String>,
}

/// Owns one service's server pool, health/fenced sets, selection strategy
/// and optional sticky resolver.
///
/// A balancer is itself a [`RequestHandler`], so it can be added as a
/// server of a parent balancer; health flows upward through registered
/// [`StatusUpdater`]s.
pub struct Balancer {
    service: String,
    strategy: Box<dyn Strategy>,
    pool: RwLock<Pool>,
    updaters: Mutex<Vec<StatusUpdater>>,
    health_check: bool,
    sticky: Option<StickyResolver>,
}

impl Balancer {
    pub fn new(
        service: impl Into<String>,
        strategy: Box<dyn Strategy>,
        sticky: Option<StickyConfig>,
        health_check: bool,
    ) -> Self {
        Self {
            service: service.into(),
            strategy,
            pool: RwLock::new(Pool {
                handlers: Vec::new(),
                by_name: HashMap::new(),
                status: HashSet::new(),
                fenced: HashSet::new(),
            }),
            updaters: Mutex::new(Vec::new()),
            health_check,
            sticky: sticky.map(StickyResolver::new),
        }
    }

    /// Build a balancer from configuration plus a name→handler map.
    /// Configured servers without a handler are skipped with a warning.
    pub fn from_config(
        config: &ServiceConfig,
        handlers: &HashMap<String, Arc<dyn RequestHandler>>,
        registry: Option<Arc<EwmaRegistry>>,
    ) -> Self {
        let strategy = config.strategy.build(registry);
        let balancer = Self::new(
            &config.name,
            strategy,
            config.sticky.clone(),
            config.health_check,
        );
        for server in &config.servers {
            match handlers.get(&server.name) {
                Some(handler) => {
                    balancer.add(&server.name, Arc::clone(handler), server.weight, server.fenced);
                }
                None => tracing::warn!(
                    service = %config.name,
                    server = %server.name,
                    "no handler provided for configured server"
                ),
            }
        }
        balancer
    }

    /// Service name this balancer is bound to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Aggregate health: any member healthy.
    pub fn is_up(&self) -> bool {
        !self.pool.read().expect("pool lock poisoned").status.is_empty()
    }

    /// Number of registered servers, fenced ones included.
    pub fn server_count(&self) -> usize {
        self.pool.read().expect("pool lock poisoned").handlers.len()
    }

    /// Whether `name` is registered and fenced.
    pub fn is_fenced(&self, name: &str) -> bool {
        self.pool
            .read()
            .expect("pool lock poisoned")
            .fenced
            .contains(name)
    }

    /// Register a backend server. Idempotent by name; non-positive
    /// weights are ignored. Safe to call while traffic flows.
    pub fn add(&self, name: &str, handler: Arc<dyn RequestHandler>, weight: f64, fenced: bool) {
        if weight <= 0.0 {
            tracing::warn!(
                service = %self.service,
                server = %name,
                weight,
                "ignoring server with non-positive weight"
            );
            return;
        }
        let server = {
            let mut pool = self.pool.write().expect("pool lock poisoned");
            if pool.by_name.contains_key(name) {
                return;
            }
            let server = Arc::new(ServerHandle::new(name, handler, weight));
            pool.handlers.push(Arc::clone(&server));
            pool.by_name.insert(name.to_string(), Arc::clone(&server));
            pool.status.insert(name.to_string());
            if fenced {
                pool.fenced.insert(name.to_string());
            } else {
                self.strategy.add(Arc::clone(&server));
            }
            server
        };
        if let Some(resolver) = &self.sticky {
            resolver.register(server);
        }
        tracing::debug!(
            service = %self.service,
            server = %name,
            weight,
            fenced,
            "server added"
        );
    }

    /// Toggle a child's health. When the aggregate health flips as a
    /// result, every registered updater fires with the new aggregate —
    /// and only then, so a leaf flapping down never reaches a grandparent
    /// unless it was the last healthy child.
    pub fn set_status(&self, child: &str, up: bool) {
        let transition = {
            let mut pool = self.pool.write().expect("pool lock poisoned");
            let up_before = !pool.status.is_empty();
            if up {
                pool.status.insert(child.to_string());
            } else {
                pool.status.remove(child);
            }
            self.strategy.set_up(child, up);
            let up_after = !pool.status.is_empty();
            (up_before != up_after).then_some(up_after)
        };
        tracing::debug!(service = %self.service, child = %child, up, "child status updated");
        // Updaters run after the lock is released so a parent's
        // set_status can re-enter this balancer without deadlocking.
        if let Some(up_now) = transition {
            tracing::info!(service = %self.service, up = up_now, "aggregate status changed");
            for updater in self
                .updaters
                .lock()
                .expect("updater list lock poisoned")
                .iter()
            {
                updater(up_now);
            }
        }
    }

    /// Register a health observer. Errors unless the balancer was built
    /// with health-check support; called during topology construction,
    /// before traffic flows.
    pub fn register_status_updater(&self, updater: StatusUpdater) -> BalancerResult<()> {
        if !self.health_check {
            return Err(BalancerError::HealthCheckDisabled);
        }
        self.updaters
            .lock()
            .expect("updater list lock poisoned")
            .push(updater);
        Ok(())
    }

    /// Wire `child` in as a nested balancer: it joins the pool under
    /// `name`, and its aggregate transitions feed `self.set_status`.
    /// The child must have health-check support enabled.
    pub fn add_child(
        self: &Arc<Self>,
        name: &str,
        child: Arc<Balancer>,
        weight: f64,
    ) -> BalancerResult<()> {
        let parent = Arc::downgrade(self);
        let child_name = name.to_string();
        child.register_status_updater(Box::new(move |up| {
            if let Some(parent) = parent.upgrade() {
                parent.set_status(&child_name, up);
            }
        }))?;
        self.add(name, child, weight, false);
        Ok(())
    }

    /// The dispatch state machine: sticky pin first, then the strategy,
    /// then the canned 503.
    pub async fn dispatch(&self, req: HttpRequest) -> HttpResponse {
        if let Some(resolver) = &self.sticky {
            if let Some(hit) = resolver.resolve(&req) {
                // Fencing is ignored here: a draining server keeps
                // serving the sessions already pinned to it.
                let healthy = self
                    .pool
                    .read()
                    .expect("pool lock poisoned")
                    .status
                    .contains(hit.server.name());
                if healthy {
                    let token = if hit.needs_rewrite {
                        tracing::debug!(
                            service = %self.service,
                            server = %hit.server.name(),
                            "legacy sticky token, rewriting to canonical form"
                        );
                        resolver.canonical_token(hit.server.name())
                    } else {
                        None
                    };
                    return self.forward(hit.server, req, token).await;
                }
            }
        }

        let Some(server) = self.strategy.next_server() else {
            tracing::debug!(service = %self.service, "no available server");
            return response::no_available_server();
        };
        let token = self
            .sticky
            .as_ref()
            .and_then(|resolver| resolver.canonical_token(server.name()));
        self.forward(server, req, token).await
    }

    async fn forward(
        &self,
        server: Arc<ServerHandle>,
        req: HttpRequest,
        token: Option<String>,
    ) -> HttpResponse {
        // The guard finalizes the in-flight count even if the handler
        // panics or the request future is dropped mid-response.
        let _inflight = server.begin_request();
        let started = Instant::now();
        let handler = Arc::clone(server.handler());
        let mut resp = handler.call(req).await;
        self.strategy.record(&server, started.elapsed());
        if let (Some(resolver), Some(token)) = (&self.sticky, token) {
            resolver.apply_token(&mut resp, &token);
        }
        resp
    }
}

impl RequestHandler for Balancer {
    fn call(&self, req: HttpRequest) -> HandlerFuture<'_> {
        Box::pin(self.dispatch(req))
    }
}
