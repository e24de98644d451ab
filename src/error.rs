//! # Batcher Error Types
//!
//! Structured error handling for configuration and dispatch failures using thiserror.

use thiserror::Error;

/// Errors raised while configuring a batcher or its ambient stack
#[derive(Error, Debug)]
pub enum BatcherError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load configuration: {source}")]
    ConfigLoad {
        #[from]
        source: config::ConfigError,
    },
}

impl BatcherError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BatcherError>;

/// A sink rejected a batch during a flush pass.
///
/// The rejected batch is handed back in `failed`; it has already left the
/// pending queue and is not retried. `dispatched` holds the commands this
/// same call had already delivered on earlier passes before the failure.
#[derive(Error, Debug)]
#[error("Sink dispatch failed for a batch of {} command(s)", .failed.len())]
pub struct DispatchError<C, E> {
    #[source]
    pub source: E,
    pub failed: Vec<C>,
    pub dispatched: Vec<C>,
}

impl<C, E> DispatchError<C, E> {
    /// Consume the error, keeping only the sink's own failure
    pub fn into_source(self) -> E {
        self.source
    }
}
