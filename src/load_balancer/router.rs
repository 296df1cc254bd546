//! Shared router handle.
//!
//! # Responsibilities
//! - Pick one routing strategy at construction time
//! - Serialize every membership and routing operation behind one lock
//! - Hand out owned addresses only, never references into router state

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::load_balancer::{
    backend::BackendAddress, consistent_hash::ConsistentHashRing,
    dynamic_wrr::DynamicWeightedRoundRobin, RoutingStrategy,
};

/// Which routing strategy a router uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Salted hash ring keyed on the request line.
    ConsistentHash,
    /// Least-loaded backend, load relieved at hand-off.
    #[default]
    DynamicWeightedRoundRobin,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::ConsistentHash => f.write_str("consistent_hash"),
            StrategyKind::DynamicWeightedRoundRobin => f.write_str("dynamic_weighted_round_robin"),
        }
    }
}

/// The closed set of routing strategies.
#[derive(Debug)]
pub enum Strategy {
    ConsistentHash(ConsistentHashRing),
    DynamicWeightedRoundRobin(DynamicWeightedRoundRobin),
}

impl Strategy {
    pub fn new(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::ConsistentHash => Strategy::ConsistentHash(ConsistentHashRing::new()),
            StrategyKind::DynamicWeightedRoundRobin => {
                Strategy::DynamicWeightedRoundRobin(DynamicWeightedRoundRobin::new())
            }
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::ConsistentHash(_) => StrategyKind::ConsistentHash,
            Strategy::DynamicWeightedRoundRobin(_) => StrategyKind::DynamicWeightedRoundRobin,
        }
    }

    fn as_dyn(&mut self) -> &mut dyn RoutingStrategy {
        match self {
            Strategy::ConsistentHash(ring) => ring,
            Strategy::DynamicWeightedRoundRobin(dwrr) => dwrr,
        }
    }
}

impl RoutingStrategy for Strategy {
    fn add_server(&mut self, addr: BackendAddress) {
        self.as_dyn().add_server(addr)
    }

    fn remove_server(&mut self, addr: &BackendAddress) {
        self.as_dyn().remove_server(addr)
    }

    fn route(&mut self, key: &str) -> Option<BackendAddress> {
        self.as_dyn().route(key)
    }

    fn relieve(&mut self, addr: &BackendAddress) {
        self.as_dyn().relieve(addr)
    }

    fn len(&self) -> usize {
        match self {
            Strategy::ConsistentHash(ring) => ring.len(),
            Strategy::DynamicWeightedRoundRobin(dwrr) => dwrr.len(),
        }
    }

    fn backends(&self) -> Vec<BackendAddress> {
        match self {
            Strategy::ConsistentHash(ring) => ring.backends(),
            Strategy::DynamicWeightedRoundRobin(dwrr) => dwrr.backends(),
        }
    }
}

/// Thread-safe router shared by every connection handler of a listener.
///
/// All four operations run under a single mutex and never perform I/O while
/// holding it.
#[derive(Debug)]
pub struct Router {
    kind: StrategyKind,
    strategy: Mutex<Strategy>,
}

impl Router {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            strategy: Mutex::new(Strategy::new(kind)),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, Strategy> {
        // Strategy state is plain data; a panic elsewhere cannot leave it torn.
        self.strategy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a backend.
    pub fn add_server(&self, addr: BackendAddress) {
        tracing::debug!(backend = %addr, strategy = %self.kind, "Backend registered");
        self.lock().add_server(addr);
    }

    /// Deregister a backend. Unknown addresses are ignored.
    pub fn remove_server(&self, addr: &BackendAddress) {
        tracing::debug!(backend = %addr, strategy = %self.kind, "Backend deregistered");
        self.lock().remove_server(addr);
    }

    /// Pick the backend for `key`, or `None` if no backend is registered.
    pub fn route(&self, key: &str) -> Option<BackendAddress> {
        self.lock().route(key)
    }

    /// Signal that a request routed to `addr` has been handed off.
    pub fn relieve(&self, addr: &BackendAddress) {
        self.lock().relieve(addr);
    }

    /// Current load of `addr` under the weighted strategy.
    ///
    /// Always `None` for the hash ring, which tracks no load.
    pub fn load(&self, addr: &BackendAddress) -> Option<i64> {
        match &*self.lock() {
            Strategy::DynamicWeightedRoundRobin(dwrr) => dwrr.load(addr),
            Strategy::ConsistentHash(_) => None,
        }
    }

    /// Snapshot of the registered backends.
    pub fn backends(&self) -> Vec<BackendAddress> {
        self.lock().backends()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
