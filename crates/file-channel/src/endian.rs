//! Byte Order Handling

use serde::{Deserialize, Serialize};

/// Byte order of multi-byte values stored in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl ByteOrder {
    /// Byte order of the running machine
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Map a `bigEndian`-style flag to a byte order
    pub fn from_big_endian(big_endian: bool) -> Self {
        if big_endian {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Whether values stored in this order must be swapped on this machine
    pub fn needs_swap(self) -> bool {
        self != Self::native()
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::Little
    }
}

/// Reverse the byte order of a single value in place
#[inline]
pub fn swap_bytes(bytes: &mut [u8]) {
    bytes.reverse();
}
