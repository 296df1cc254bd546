//! Task execution subsystem.
//!
//! # Data Flow
//! ```text
//! Listener accepts a socket
//!     → pool.rs submit (bounded FIFO queue, overload policy applied)
//!     → one of N workers dequeues the task
//!     → task runs to completion on that worker
//!     → failures/panics logged at the task boundary, worker resumes
//! ```
//!
//! # Design Decisions
//! - Fixed worker count bounds concurrent connection handling
//! - Bounded queue; overload is either backpressure or rejection
//! - No cancellation of in-flight tasks

pub mod pool;

pub use pool::{BoxError, OverloadPolicy, PoolError, Task, WorkerPool};
