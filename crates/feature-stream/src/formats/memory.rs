//! In-Memory Decoded Source

use super::{Backing, DecodedFrames, FeatureSource, FrameLayout};
use crate::error::FeatureError;

/// Frames held in memory, served through the decoded pull interface
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    vect_size: usize,
    samples: Vec<f32>,
    /// Sample index of the next read
    cursor: usize,
    open: bool,
    /// Number of explicit repositionings, for I/O accounting
    seeks: usize,
}

impl MemorySource {
    /// Source over flat samples; a trailing partial frame is ignored
    pub fn new(name: impl Into<String>, vect_size: usize, samples: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            vect_size,
            samples,
            cursor: 0,
            open: false,
            seeks: 0,
        }
    }

    /// Source over a list of equally sized frames
    pub fn from_frames(name: impl Into<String>, frames: &[Vec<f32>]) -> Self {
        let vect_size = frames.first().map_or(0, Vec::len);
        Self::new(name, vect_size, frames.concat())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// How many times the source was explicitly repositioned
    pub fn seek_count(&self) -> usize {
        self.seeks
    }
}

impl DecodedFrames for MemorySource {
    fn seek_frame(&mut self, index: u64) -> Result<(), FeatureError> {
        let target = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.vect_size))
            .unwrap_or(usize::MAX);
        self.cursor = target.min(self.samples.len());
        self.open = true;
        self.seeks += 1;
        Ok(())
    }

    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize, FeatureError> {
        self.open = true;
        let n = out.len().min(self.samples.len() - self.cursor);
        out[..n].copy_from_slice(&self.samples[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    fn close(&mut self) {
        self.open = false;
    }
}

impl FeatureSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn layout(&mut self) -> Result<FrameLayout, FeatureError> {
        if self.vect_size == 0 {
            return Err(FeatureError::InvalidData(format!(
                "{}: vector size is 0",
                self.name
            )));
        }
        Ok(FrameLayout {
            vect_size: self.vect_size,
            feature_count: (self.samples.len() / self.vect_size) as u64,
            header_length: 0,
        })
    }

    fn backing(&mut self) -> Backing<'_> {
        Backing::Decoded(self)
    }
}
