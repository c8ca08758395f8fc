//! Channel Error Types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`FileChannel`](crate::FileChannel)
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Path cannot be opened
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Read requested beyond the available bytes
    #[error("Unexpected end of file")]
    EndOfFile,

    /// Any other system-level failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Underlying file handle missing after an open attempt
    #[error("Channel on {} is not open", .0.display())]
    NotOpen(PathBuf),

    /// Content could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => ChannelError::EndOfFile,
            io::ErrorKind::InvalidData => ChannelError::InvalidData(err.to_string()),
            _ => ChannelError::Io(err.to_string()),
        }
    }
}
