//! HTK Parameter Files
//!
//! 12-byte header: `nSamples: i32`, `sampPeriod: i32` (100ns units),
//! `sampSize: i16` (bytes per frame), `parmKind: i16`.

use super::{ordered, FrameLayout};
use crate::error::FeatureError;
use crate::SAMPLE_BYTES;
use file_channel::{ByteOrder, FileChannel};
use std::io::{self, Write};
use tracing::warn;

pub(super) const HEADER_LENGTH: u64 = 12;

/// `_C` qualifier: compressed 16-bit storage
const COMPRESSED: i16 = 0o2000;

/// `USER` parameter kind
pub(crate) const PARM_KIND_USER: i16 = 9;

pub(super) fn read_layout(channel: &mut FileChannel) -> Result<FrameLayout, FeatureError> {
    channel.seek(0)?;
    let n_samples = channel.read_i32()?;
    let _sample_period = channel.read_i32()?;
    let sample_size = channel.read_i16()?;
    let parm_kind = channel.read_i16()?;

    if parm_kind & COMPRESSED != 0 {
        return Err(FeatureError::InvalidData(
            "compressed HTK parameter files are not supported".to_string(),
        ));
    }
    if sample_size <= 0 || sample_size as u64 % SAMPLE_BYTES != 0 {
        return Err(FeatureError::InvalidData(format!(
            "HTK sample size {} is not a positive multiple of {}",
            sample_size, SAMPLE_BYTES
        )));
    }
    let n_samples = u64::try_from(n_samples).map_err(|_| {
        FeatureError::InvalidData(format!("negative HTK sample count {}", n_samples))
    })?;

    let vect_size = (sample_size as u64 / SAMPLE_BYTES) as usize;
    let mut layout = FrameLayout::from_length(vect_size, HEADER_LENGTH, channel.length()?)?;
    if n_samples > layout.feature_count {
        warn!(
            "{}: header announces {} frames but only {} are present",
            channel.path().display(),
            n_samples,
            layout.feature_count
        );
    } else {
        layout.feature_count = n_samples;
    }
    Ok(layout)
}

pub(crate) fn write_header<W: Write>(
    out: &mut W,
    order: ByteOrder,
    n_samples: i32,
    sample_period: i32,
    vect_size: usize,
    parm_kind: i16,
) -> io::Result<()> {
    let sample_size = i16::try_from(vect_size as u64 * SAMPLE_BYTES).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("vector size {} is too large for HTK", vect_size),
        )
    })?;
    out.write_all(&ordered(n_samples.to_ne_bytes(), order))?;
    out.write_all(&ordered(sample_period.to_ne_bytes(), order))?;
    out.write_all(&ordered(sample_size.to_ne_bytes(), order))?;
    out.write_all(&ordered(parm_kind.to_ne_bytes(), order))?;
    Ok(())
}
