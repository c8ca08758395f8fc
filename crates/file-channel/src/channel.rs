//! Buffered Binary File Channel

use crate::endian::{swap_bytes, ByteOrder};
use crate::error::ChannelError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Size in bytes of one stored float sample
const FLOAT_BYTES: usize = 4;

/// Read-only binary channel over a single file
///
/// The file is opened lazily on the first access; `open` and `close` may be
/// called any number of times. Every multi-byte read honours the swap flag.
pub struct FileChannel {
    /// Path of the underlying file
    path: PathBuf,
    /// Open handle, `None` while closed
    reader: Option<BufReader<File>>,
    /// Reverse the bytes of every multi-byte value
    swap: bool,
    /// Scratch space for bulk float reads
    scratch: Vec<u8>,
}

impl FileChannel {
    /// Create a closed channel on `path` with no byte swapping
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            swap: false,
            scratch: Vec::new(),
        }
    }

    /// Create a closed channel for a file stored in `order`
    pub fn with_byte_order(path: impl Into<PathBuf>, order: ByteOrder) -> Self {
        let mut channel = Self::new(path);
        channel.swap = order.needs_swap();
        channel
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether multi-byte values are swapped
    pub fn swap(&self) -> bool {
        self.swap
    }

    /// Enable or disable byte swapping
    pub fn set_swap(&mut self, swap: bool) {
        self.swap = swap;
    }

    /// Whether the file is currently open
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Open the file, positioned at offset 0. No-op when already open.
    pub fn open(&mut self) -> Result<(), ChannelError> {
        if self.reader.is_some() {
            return Ok(());
        }
        let file = File::open(&self.path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ChannelError::FileNotFound(self.path.clone()),
            _ => ChannelError::from(err),
        })?;
        debug!("Opened channel on {}", self.path.display());
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    /// Close the file. No-op when already closed.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed channel on {}", self.path.display());
        }
    }

    fn reader(&mut self) -> Result<&mut BufReader<File>, ChannelError> {
        self.open()?;
        self.reader
            .as_mut()
            .ok_or_else(|| ChannelError::NotOpen(self.path.clone()))
    }

    /// Position the channel at an absolute byte offset
    pub fn seek(&mut self, offset: u64) -> Result<(), ChannelError> {
        self.reader()?.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Current absolute byte offset
    pub fn position(&mut self) -> Result<u64, ChannelError> {
        Ok(self.reader()?.stream_position()?)
    }

    /// Total length of the file in bytes
    pub fn length(&mut self) -> Result<u64, ChannelError> {
        Ok(self.reader()?.get_ref().metadata()?.len())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ChannelError> {
        let mut bytes = [0u8; N];
        self.reader()?.read_exact(&mut bytes)?;
        if self.swap {
            swap_bytes(&mut bytes);
        }
        Ok(bytes)
    }

    /// Read a single byte as a character
    pub fn read_char(&mut self) -> Result<char, ChannelError> {
        let [byte] = self.read_array::<1>()?;
        Ok(char::from(byte))
    }

    pub fn read_i16(&mut self) -> Result<i16, ChannelError> {
        Ok(i16::from_ne_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, ChannelError> {
        Ok(u16::from_ne_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ChannelError> {
        Ok(i32::from_ne_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ChannelError> {
        Ok(u32::from_ne_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ChannelError> {
        Ok(f32::from_ne_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ChannelError> {
        Ok(f64::from_ne_bytes(self.read_array()?))
    }

    /// Read exactly `len` bytes and decode them as text
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String, ChannelError> {
        let mut bytes = vec![0u8; len];
        self.reader()?.read_exact(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read up to the next newline, which is consumed but not returned
    ///
    /// A final line without a newline is returned as-is; hitting end of file
    /// before any byte was read fails with [`ChannelError::EndOfFile`].
    pub fn read_line(&mut self) -> Result<String, ChannelError> {
        let mut bytes = Vec::new();
        let read = self.reader()?.read_until(b'\n', &mut bytes)?;
        if read == 0 {
            return Err(ChannelError::EndOfFile);
        }
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Best-effort bulk read of 32-bit floats
    ///
    /// Fills as much of `out` as the file allows and returns the number of
    /// whole floats read, which may be less than `out.len()` (including 0).
    /// Short reads are not errors.
    pub fn read_some_floats(&mut self, out: &mut [f32]) -> Result<usize, ChannelError> {
        self.open()?;
        let wanted = out.len() * FLOAT_BYTES;
        let Self {
            reader,
            scratch,
            swap,
            path,
        } = self;
        let reader = reader
            .as_mut()
            .ok_or_else(|| ChannelError::NotOpen(path.clone()))?;

        scratch.resize(wanted, 0);
        let mut filled = 0;
        while filled < wanted {
            match reader.read(&mut scratch[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        let count = filled / FLOAT_BYTES;
        if filled % FLOAT_BYTES != 0 {
            warn!(
                "{}: {} trailing bytes do not form a whole float",
                path.display(),
                filled % FLOAT_BYTES
            );
        }
        for (dst, chunk) in out.iter_mut().zip(scratch[..count * FLOAT_BYTES].chunks_exact(FLOAT_BYTES)) {
            let mut bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
            if *swap {
                swap_bytes(&mut bytes);
            }
            *dst = f32::from_ne_bytes(bytes);
        }
        Ok(count)
    }
}

impl std::fmt::Debug for FileChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChannel")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("swap", &self.swap)
            .finish()
    }
}
