//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request line read by the connection handler
//!     → router.rs (single lock around the chosen strategy)
//!     → Apply routing strategy:
//!         - consistent_hash.rs (salted 128-bit ring, key = request line)
//!         - dynamic_wrr.rs (least-loaded backend, load charged on route)
//!     → backend.rs (owned `host:port` address handed back)
//!     → Handler connects, forwards, then relieves the backend at hand-off
//! ```
//!
//! # Design Decisions
//! - Strategy chosen once per router, closed set of variants
//! - Router owns all membership and load state; callers get clones
//! - No health checking: backends stay registered until removed

pub mod backend;
pub mod consistent_hash;
pub mod dynamic_wrr;
pub mod router;

pub use backend::{AddressError, BackendAddress};
pub use router::{Router, Strategy, StrategyKind};

/// Capability set shared by every routing strategy.
pub trait RoutingStrategy {
    /// Register a backend.
    fn add_server(&mut self, addr: BackendAddress);

    /// Deregister a backend; unknown addresses are ignored.
    fn remove_server(&mut self, addr: &BackendAddress);

    /// Pick a backend for `key`, or `None` when nothing is registered.
    fn route(&mut self, key: &str) -> Option<BackendAddress>;

    /// A request previously routed to `addr` has been handed off.
    fn relieve(&mut self, addr: &BackendAddress);

    /// Number of registered backends.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered backends.
    fn backends(&self) -> Vec<BackendAddress>;
}
