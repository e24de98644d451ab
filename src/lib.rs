#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Command Batcher
//!
//! Thread-safe command batching coordinator sitting between many producers and a
//! single downstream sink.
//!
//! ## Overview
//!
//! Producers submit commands from any thread. Commands accumulate in a FIFO queue
//! and are flushed to the sink either once the configured batch size is reached
//! or immediately on a forced flush. At most one flush runs against the sink at
//! any instant, and no command is lost, duplicated, or reordered within a batch.
//!
//! ## Module Organization
//!
//! - [`batching`] - Pending queue, flush coordinator and dispatched results
//! - [`sink`] - The downstream dispatch capability plus ready-made sinks
//! - [`config`] - Batch size and logging configuration, YAML/env loading
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use command_batcher::{BatchSize, ChannelSink, CommandBatching, SimpleBatcher};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, batches) = ChannelSink::unbounded();
//! let batcher = SimpleBatcher::new(sink, BatchSize::Bounded(2));
//!
//! batcher.submit("SET a 1", Some(CommandBatching::Queue))?;
//! batcher.submit("SET b 2", None)?;
//!
//! assert_eq!(batches.recv()?, vec!["SET a 1", "SET b 2"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, including concurrency stress and property tests
//! ```

pub mod batching;
pub mod config;
pub mod error;
pub mod logging;
pub mod sink;

pub use batching::{
    BatchTasks, Batcher, BatcherMetrics, CommandBatching, FlushResult, MetricsSnapshot,
    PendingQueue, SimpleBatcher,
};
pub use config::{BatchSize, BatcherConfig, ConfigManager, LogFormat, LoggingConfig};
pub use error::{BatcherError, DispatchError, Result};
pub use sink::{ChannelSink, CollectingSink, Sink, SinkDisconnected};
