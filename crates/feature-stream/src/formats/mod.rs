//! Feature File Format Adapters
//!
//! Every adapter reports a [`FrameLayout`] and hands the stream either a
//! raw [`FileChannel`] positioned by byte offset or a decoded-frame pull
//! interface positioned by frame index.

mod htk;
mod memory;
mod raw;
mod spro;

pub use memory::MemorySource;

pub(crate) use htk::{write_header as write_htk_header, PARM_KIND_USER};
pub(crate) use spro::write_header as write_spro_header;

use crate::error::FeatureError;
use crate::settings::FileFormat;
use crate::SAMPLE_BYTES;
use file_channel::{swap_bytes, ByteOrder, FileChannel};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Geometry of the frame data in a feature file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameLayout {
    /// Coefficients per frame
    pub vect_size: usize,
    /// Whole frames available
    pub feature_count: u64,
    /// Byte offset of the first frame
    pub header_length: u64,
}

impl FrameLayout {
    /// Bytes per stored frame
    pub fn frame_bytes(&self) -> u64 {
        self.vect_size as u64 * SAMPLE_BYTES
    }

    /// Byte offset of frame `index`
    pub fn offset_of(&self, index: u64) -> u64 {
        self.header_length + index * self.frame_bytes()
    }

    /// Layout of a file of `file_length` bytes whose frames start at `header_length`
    pub(crate) fn from_length(
        vect_size: usize,
        header_length: u64,
        file_length: u64,
    ) -> Result<Self, FeatureError> {
        if vect_size == 0 {
            return Err(FeatureError::InvalidData("vector size is 0".to_string()));
        }
        let payload = file_length.checked_sub(header_length).ok_or_else(|| {
            FeatureError::InvalidData(format!(
                "file of {} bytes is shorter than its {} byte header",
                file_length, header_length
            ))
        })?;
        let frame_bytes = vect_size as u64 * SAMPLE_BYTES;
        if payload % frame_bytes != 0 {
            warn!(
                "Ignoring {} trailing bytes after the last whole frame",
                payload % frame_bytes
            );
        }
        Ok(Self {
            vect_size,
            feature_count: payload / frame_bytes,
            header_length,
        })
    }
}

/// Reorder native-order `bytes` into `order`
pub(crate) fn ordered<const N: usize>(mut bytes: [u8; N], order: ByteOrder) -> [u8; N] {
    if order.needs_swap() {
        swap_bytes(&mut bytes);
    }
    bytes
}

/// Frame-indexed pull interface for sources that decode on the fly
pub trait DecodedFrames {
    /// Position the source so the next read starts at frame `index`
    fn seek_frame(&mut self, index: u64) -> Result<(), FeatureError>;

    /// Best-effort read of samples; returns how many were written
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize, FeatureError>;

    /// Release any resource held by the source
    fn close(&mut self);
}

/// Access mode of a feature source
pub enum Backing<'a> {
    /// Frames are raw floats read from a file channel
    Channel(&'a mut FileChannel),
    /// Frames are pulled already decoded
    Decoded(&'a mut dyn DecodedFrames),
}

impl Backing<'_> {
    pub fn close(self) {
        match self {
            Backing::Channel(channel) => channel.close(),
            Backing::Decoded(frames) => frames.close(),
        }
    }
}

/// Producer of feature frames for a buffered stream
pub trait FeatureSource {
    /// Name the stream registers labels under
    fn name(&self) -> &str;

    /// Parse (or recall) the frame geometry
    fn layout(&mut self) -> Result<FrameLayout, FeatureError>;

    /// Borrow the underlying frame access
    fn backing(&mut self) -> Backing<'_>;
}

/// Feature file on disk in one of the supported formats
#[derive(Debug)]
pub struct FileSource {
    name: String,
    format: FileFormat,
    channel: FileChannel,
    /// Configured vector size, required for RAW
    vect_size: Option<usize>,
    layout: Option<FrameLayout>,
}

impl FileSource {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        format: FileFormat,
        order: ByteOrder,
        vect_size: Option<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            channel: FileChannel::with_byte_order(path, order),
            vect_size,
            layout: None,
        }
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn channel(&self) -> &FileChannel {
        &self.channel
    }
}

impl FeatureSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn layout(&mut self) -> Result<FrameLayout, FeatureError> {
        if let Some(layout) = self.layout {
            return Ok(layout);
        }
        let layout = match self.format {
            FileFormat::Raw => raw::read_layout(&mut self.channel, self.vect_size)?,
            FileFormat::Htk => htk::read_layout(&mut self.channel)?,
            FileFormat::Spro3 => spro::read_layout(&mut self.channel, false)?,
            FileFormat::Spro4 => spro::read_layout(&mut self.channel, true)?,
        };
        if let Some(expected) = self.vect_size {
            if expected != layout.vect_size {
                warn!(
                    "{}: header vector size {} overrides configured {}",
                    self.name, layout.vect_size, expected
                );
            }
        }
        debug!("{}: {:?} layout {:?}", self.name, self.format, layout);
        self.layout = Some(layout);
        Ok(layout)
    }

    fn backing(&mut self) -> Backing<'_> {
        Backing::Channel(&mut self.channel)
    }
}
