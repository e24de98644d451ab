//! # Batcher Configuration System
//!
//! Typed configuration for the command batcher. Values are layered from built-in
//! defaults, optional YAML files and `BATCHER__*` environment variables by the
//! [`ConfigManager`], then validated before any command flows.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use command_batcher::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let batch_size = manager.config().batch_size;
//! println!("batching {batch_size} commands per default flush");
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BatcherError, Result};

pub use loader::ConfigManager;

/// Sentinel accepted wherever a raw integer batch size is parsed
pub const UNBOUNDED_SENTINEL: i64 = -1;

/// Batch size used when none is configured
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Threshold for default flushes and cap on default drains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBatchSize", into = "RawBatchSize")]
pub enum BatchSize {
    /// Default flush once this many commands are queued, draining at most this many
    Bounded(usize),
    /// Never flush by size; only forced flushes drain
    Unbounded,
}

impl BatchSize {
    /// Parse a raw batch size where `-1` means unbounded and anything else must be at least 2
    pub fn new(value: i64) -> Result<Self> {
        if value == UNBOUNDED_SENTINEL {
            return Ok(Self::Unbounded);
        }

        if value < 2 {
            return Err(BatcherError::configuration(format!(
                "Batch size must be greater than 1 or {UNBOUNDED_SENTINEL} (unbounded), got {value}"
            )));
        }

        usize::try_from(value)
            .map(Self::Bounded)
            .map_err(|_| BatcherError::configuration(format!("Batch size {value} is too large")))
    }

    /// Bounded batch size, rejecting 0 and 1
    pub fn bounded(size: usize) -> Result<Self> {
        if size < 2 {
            return Err(BatcherError::configuration(format!(
                "Batch size must be greater than 1, got {size}"
            )));
        }
        Ok(Self::Bounded(size))
    }

    /// The threshold, or `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Bounded(size) => Some(*size),
            Self::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// True when `queued` items reach the default-flush threshold
    pub fn is_reached_by(&self, queued: usize) -> bool {
        match self {
            Self::Bounded(size) => queued >= *size,
            Self::Unbounded => false,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Bounded(size) => Self::bounded(*size).map(|_| ()),
            Self::Unbounded => Ok(()),
        }
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::Bounded(DEFAULT_BATCH_SIZE)
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(size) => write!(f, "{size}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl TryFrom<i64> for BatchSize {
    type Error = BatcherError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

/// Wire form of a batch size: an integer (with `-1` as sentinel) or the word `unbounded`.
///
/// Environment variables arrive as strings, so numeric text is accepted as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawBatchSize {
    Number(i64),
    Text(String),
}

impl TryFrom<RawBatchSize> for BatchSize {
    type Error = BatcherError;

    fn try_from(raw: RawBatchSize) -> Result<Self> {
        match raw {
            RawBatchSize::Number(value) => Self::new(value),
            RawBatchSize::Text(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("unbounded") {
                    return Ok(Self::Unbounded);
                }
                let value = text.parse::<i64>().map_err(|e| {
                    BatcherError::configuration(format!("Invalid batch size '{text}': {e}"))
                })?;
                Self::new(value)
            }
        }
    }
}

impl From<BatchSize> for RawBatchSize {
    fn from(size: BatchSize) -> Self {
        match size {
            BatchSize::Bounded(size) => RawBatchSize::Number(size as i64),
            BatchSize::Unbounded => RawBatchSize::Number(UNBOUNDED_SENTINEL),
        }
    }
}

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings consumed by [`crate::logging::init_structured_logging`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive such as `debug` or `command_batcher=trace`; environment default when absent
    #[serde(default)]
    pub level: Option<String>,

    #[serde(default)]
    pub format: LogFormat,
}

/// Root configuration structure mirroring `config/batcher.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Name attached to every log event emitted by the batcher
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub batch_size: BatchSize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "batcher".to_string()
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            batch_size: BatchSize::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BatcherConfig {
    /// Configuration with the given batch size and defaults elsewhere
    pub fn with_batch_size(batch_size: BatchSize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BatcherError::configuration("Batcher name must not be empty"));
        }

        self.batch_size.validate()?;

        if let Some(level) = &self.logging.level {
            tracing_subscriber::EnvFilter::try_new(level).map_err(|e| {
                BatcherError::configuration(format!("Invalid log level '{level}': {e}"))
            })?;
        }

        Ok(())
    }
}
