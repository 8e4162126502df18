//! Sequencing error types

use thiserror::Error;

use crate::transition::TransitionKind;

/// Errors surfaced by hosts, registries and configuration loading
#[derive(Error, Debug)]
pub enum SequenceError {
    /// Index already registered with different transitions or delay
    #[error("item {index} is already registered with different parameters; each index must be unique")]
    IndexConflict { index: i32 },

    /// A descriptor was registered in the wrong slot
    #[error("item {index}: expected an {slot} transition, got {found}")]
    TransitionKind {
        index: i32,
        slot: TransitionKind,
        found: TransitionKind,
    },

    /// The sequence was cancelled at a suspension point
    #[error("sequence cancelled")]
    Cancelled,

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SequenceError {
    /// Whether this error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SequenceError::Cancelled)
    }
}

/// Failure reported by a step hook for a single item
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("step failed for item {index}: {message}")]
pub struct StepError {
    pub index: i32,
    pub message: String,
}

impl StepError {
    pub fn new(index: i32, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

/// Result type for sequencing operations
pub type Result<T> = std::result::Result<T, SequenceError>;
