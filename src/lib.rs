//! Teaching-scale TCP load balancer.
//!
//! ```text
//!  client ──▶ net::Listener ──▶ worker::WorkerPool ──▶ net::ConnectionHandler
//!                                                           │
//!                                   load_balancer::Router ◀─┤ route(request line)
//!                                                           │
//!                                   backend ◀── forward head┤
//!                                   router  ◀── relieve ────┤ (hand-off)
//!  client ◀──────────────────────── relay response ─────────┘
//! ```
//!
//! Two interchangeable routing strategies are provided: a salted consistent
//! hash ring and a dynamic weighted round-robin tracker that charges load on
//! routing and relieves it once the request has been handed to the backend.

pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod worker;

pub use config::BalancerConfig;
pub use lifecycle::Shutdown;
pub use load_balancer::{BackendAddress, Router, StrategyKind};
pub use net::{HandlerMode, Listener};
pub use worker::{OverloadPolicy, WorkerPool};
