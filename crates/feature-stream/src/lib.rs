//! Feature Stream
//!
//! Windowed, seekable access to binary feature files (RAW, HTK, SPro3,
//! SPro4) with an optional bounded backward-seek history.

mod error;
mod feature;
mod formats;
mod label;
mod settings;
mod stream;
mod writer;

pub use error::FeatureError;
pub use feature::Feature;
pub use formats::{Backing, DecodedFrames, FeatureSource, FileSource, FrameLayout, MemorySource};
pub use label::LabelServer;
pub use settings::{
    keys, BigEndianOverride, Config, ConfigBuilder, FeatureStreamConfig, FileFormat, HistoricMode,
    ENV_PREFIX,
};
pub use stream::{
    BufferedFeatureStream, FeatureBuffer, FeatureStream, StreamStatus, DEFAULT_BUFFER_SAMPLES,
};
pub use writer::FeatureFileWriter;

/// Size in bytes of one stored sample
pub const SAMPLE_BYTES: u64 = 4;
