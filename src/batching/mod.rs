//! # Command Batching
//!
//! Accumulates commands submitted concurrently by many callers and flushes them
//! to a single [`Sink`](crate::sink::Sink), either automatically at a size
//! threshold or on an explicit forced flush.
//!
//! ## Architecture
//!
//! - **Pending Queue**: lock-free FIFO buffer of submitted commands
//! - **Flush Coordinator**: [`SimpleBatcher`], which owns the single-flusher
//!   flag, decides how much to drain, and coalesces forced flush requests
//! - **Dispatched Result**: [`BatchTasks`], the commands one call dispatched

pub mod directive;
pub mod metrics;
pub mod queue;
pub mod simple;
pub mod tasks;

pub use directive::CommandBatching;
pub use metrics::{BatcherMetrics, MetricsSnapshot};
pub use queue::{DrainPlan, PendingQueue};
pub use simple::{FlushResult, SimpleBatcher};
pub use tasks::BatchTasks;

/// Batches commands and flushes them to a downstream sink
pub trait Batcher<C> {
    type Error;

    /// Queue `command` and flush according to `batching`, returning what this call dispatched
    fn batch(&self, command: C, batching: Option<CommandBatching>) -> Result<BatchTasks<C>, Self::Error>;

    /// Dispatch everything queued
    fn flush(&self) -> Result<BatchTasks<C>, Self::Error>;
}
