//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Start local backends → Build router → Start balancer
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C → Stop accepting → In-flight connections finish on their workers
//! ```
//!
//! # Design Decisions
//! - Ordered startup: backends before the balancer
//! - No task cancellation; only acceptors stop

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{spawn_local_backends, start_balancer, Balancer, StartupError};
