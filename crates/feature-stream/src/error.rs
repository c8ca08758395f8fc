//! Feature Stream Error Types

use file_channel::ChannelError;
use std::io;
use thiserror::Error;

/// Errors raised while configuring, reading or writing feature streams
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Failure in the underlying file channel
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Missing or malformed configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed header or content
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Write rejected
    #[error("Write forbidden: {0}")]
    WriteForbidden(String),

    /// Feature size does not match the stream
    #[error("Vector size mismatch: stream has {expected}, feature has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Seek target older than the retained history
    #[error("Feature {index} is out of history (oldest reachable is {oldest})")]
    OutOfHistory { index: u64, oldest: u64 },

    /// Configuration source could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<io::Error> for FeatureError {
    fn from(err: io::Error) -> Self {
        FeatureError::Channel(ChannelError::from(err))
    }
}
