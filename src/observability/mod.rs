//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listener, pool and handlers produce:
//!     → logging.rs (structured log events, one span per connection)
//!     → metrics.rs (counters and gauges through the `metrics` facade)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
