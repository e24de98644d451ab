//! Per-submission batching directives.

use serde::{Deserialize, Serialize};

/// How a submitted command participates in flushing
///
/// A submission without a directive takes the default path: it is queued and
/// flushes a batch only once the queue reaches the configured batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandBatching {
    /// Queue the command and never attempt a flush
    Queue,
    /// Queue the command, then drain and dispatch everything queued
    Flush,
}
