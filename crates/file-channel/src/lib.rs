//! Binary File Channel
//!
//! Low-level byte-oriented file access with optional byte swapping, used by
//! the feature file readers and the matrix persistence code.

mod channel;
mod endian;
mod error;

pub use channel::FileChannel;
pub use endian::{swap_bytes, ByteOrder};
pub use error::ChannelError;
