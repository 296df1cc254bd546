//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one task per socket)
//!     → worker pool (bounded queue, fixed workers)
//!     → handler.rs (direct response, or route + forward + relay)
//!     → connection.rs (id and lifecycle state for tracing)
//!
//! Connection States:
//!     Accepted → DirectResponse | RouteAndForward → Closed
//! ```
//!
//! # Design Decisions
//! - Wire format is a request line, header lines, one blank line; no bodies
//! - A handler occupies its worker for the whole client/backend round trip
//! - Per-connection failures never escape the task

pub mod connection;
pub mod handler;
pub mod listener;

pub use connection::{ConnectionId, ConnectionState};
pub use handler::{ConnectionError, ConnectionHandler, HandlerMode};
pub use listener::{Listener, ListenerError};
