//! Buffered Random-Access Feature Stream
//!
//! A stream holds a window `[start, start + stored)` of frames from its
//! source in a flat `f32` buffer. Reads inside the window are memory hits;
//! reads outside it refill the window, repositioning the source only when the
//! new window does not directly follow the previous one.
//!
//! Seeks are latched and applied by the next read or write. Under
//! [`HistoricMode::Limited`] a read that seeks further back than the history
//! allows yields an invalid feature and sets [`StreamStatus::OutOfHistory`]
//! instead of failing; a write in the same situation fails.

use crate::error::FeatureError;
use crate::feature::Feature;
use crate::formats::{Backing, FeatureSource, FileSource, FrameLayout};
use crate::label::LabelServer;
use crate::settings::{BigEndianOverride, FeatureStreamConfig, HistoricMode};
use crate::SAMPLE_BYTES;
use linalg::DenseVector;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Samples held by a freshly created internal buffer
pub const DEFAULT_BUFFER_SAMPLES: usize = 64 * 1024;

/// Sequential/random access to fixed-size feature vectors
pub trait FeatureStream {
    /// Read the feature at the cursor and advance by `step`
    ///
    /// Returns `Ok(false)` at end of stream.
    fn read_feature_step(&mut self, out: &mut Feature, step: u64) -> Result<bool, FeatureError>;

    /// Overwrite the feature at the cursor and advance by `step`
    fn write_feature_step(&mut self, value: &Feature, step: u64) -> Result<(), FeatureError>;

    /// Latch a seek, applied by the next read or write
    fn seek_feature(&mut self, index: u64);

    fn feature_count(&mut self) -> Result<u64, FeatureError>;

    fn vect_size(&mut self) -> Result<usize, FeatureError>;

    fn read_feature(&mut self, out: &mut Feature) -> Result<bool, FeatureError> {
        self.read_feature_step(out, 1)
    }

    fn write_feature(&mut self, value: &Feature) -> Result<(), FeatureError> {
        self.write_feature_step(value, 1)
    }
}

/// Backing store of the frame window
pub enum FeatureBuffer<'a> {
    /// Allocated and released by the stream
    Owned(DenseVector<f32>),
    /// Supplied by the caller, who keeps ownership
    Borrowed(&'a mut DenseVector<f32>),
}

impl FeatureBuffer<'_> {
    pub fn is_owned(&self) -> bool {
        matches!(self, FeatureBuffer::Owned(_))
    }

    fn get(&self) -> &DenseVector<f32> {
        match self {
            FeatureBuffer::Owned(buffer) => buffer,
            FeatureBuffer::Borrowed(buffer) => buffer,
        }
    }

    fn get_mut(&mut self) -> &mut DenseVector<f32> {
        match self {
            FeatureBuffer::Owned(buffer) => buffer,
            FeatureBuffer::Borrowed(buffer) => buffer,
        }
    }
}

/// Outcome of the last read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    NoError,
    /// A seek target was older than the retained history
    OutOfHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Nothing read yet
    Idle,
    /// Seek latched, applied on the next access
    SeekPending { target: u64 },
    Streaming,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Window {
    start: u64,
    stored: u64,
}

impl Window {
    fn contains(&self, index: u64) -> bool {
        index >= self.start && index - self.start < self.stored
    }
}

/// Windowed, seekable reader over a [`FeatureSource`]
pub struct BufferedFeatureStream<'a, S = FileSource> {
    source: S,
    layout: Option<FrameLayout>,
    buffer: FeatureBuffer<'a>,
    /// Explicit buffer byte budget
    buffer_bytes: Option<u64>,
    /// Configured memory budget, capped by the file size
    mem_alloc: Option<u64>,
    /// Buffer sizing policy already applied
    sized: bool,
    window: Window,
    /// Frame the source delivers next without repositioning
    next_frame: Option<u64>,
    /// Every frame of the source is in the window
    fully_buffered: bool,
    cursor: Cursor,
    feature_index: u64,
    /// High-water mark of `feature_index`
    last_feature_index: u64,
    historic: HistoricMode,
    status: StreamStatus,
    labels: Option<Rc<RefCell<LabelServer>>>,
}

impl<'a> BufferedFeatureStream<'a, FileSource> {
    /// Open the feature file of stream `name` as described by `config`
    pub fn open(
        name: &str,
        config: &FeatureStreamConfig,
        endian: BigEndianOverride,
    ) -> Result<Self, FeatureError> {
        config.validate()?;
        let source = FileSource::new(
            name,
            config.path_for(name),
            config.format,
            config.byte_order(endian),
            config.vect_size,
        );
        Ok(Self::new(source, config))
    }
}

impl<'a, S: FeatureSource> BufferedFeatureStream<'a, S> {
    pub fn new(source: S, config: &FeatureStreamConfig) -> Self {
        info!(
            "Creating feature stream '{}' ({:?} history)",
            source.name(),
            config.historic
        );
        Self {
            source,
            layout: None,
            buffer: FeatureBuffer::Owned(DenseVector::with_len(DEFAULT_BUFFER_SAMPLES)),
            buffer_bytes: None,
            mem_alloc: config.mem_alloc,
            sized: false,
            window: Window::default(),
            next_frame: None,
            fully_buffered: false,
            cursor: Cursor::Idle,
            feature_index: 0,
            last_feature_index: 0,
            historic: config.historic,
            status: StreamStatus::NoError,
            labels: None,
        }
    }

    /// Use an explicit buffer byte budget, ahead of any configured one
    pub fn with_buffer_bytes(mut self, bytes: u64) -> Self {
        self.buffer_bytes = Some(bytes);
        self.sized = false;
        self.forget_window();
        self
    }

    /// Register a label for every feature read
    pub fn with_label_server(mut self, labels: Rc<RefCell<LabelServer>>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Replace the window storage with a caller-owned vector
    ///
    /// Window bookkeeping is reset. The vector keeps its length whatever
    /// byte budget the stream was given; it is only grown when shorter than
    /// one feature.
    pub fn set_external_buffer(&mut self, buffer: &'a mut DenseVector<f32>) {
        debug!(
            "{}: using external buffer of {} samples",
            self.source.name(),
            buffer.len()
        );
        self.buffer = FeatureBuffer::Borrowed(buffer);
        self.sized = false;
        self.forget_window();
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn feature_index(&self) -> u64 {
        self.feature_index
    }

    pub fn last_feature_index(&self) -> u64 {
        self.last_feature_index
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn historic(&self) -> HistoricMode {
        self.historic
    }

    /// Whether every frame is memory-resident, the condition for writes
    pub fn is_fully_buffered(&self) -> bool {
        self.fully_buffered
    }

    pub fn buffer(&self) -> &FeatureBuffer<'a> {
        &self.buffer
    }

    /// Buffer capacity in samples
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.get().len()
    }

    /// Current window as `(first frame, frame count)`
    pub fn window(&self) -> (u64, u64) {
        (self.window.start, self.window.stored)
    }

    /// Drop the window and rewind the cursor and high-water mark
    pub fn reset(&mut self) {
        self.forget_window();
        self.cursor = Cursor::Idle;
        self.feature_index = 0;
        self.last_feature_index = 0;
        self.status = StreamStatus::NoError;
    }

    /// Release the source; buffered frames stay readable
    pub fn close(&mut self) {
        self.source.backing().close();
        self.next_frame = None;
    }

    fn forget_window(&mut self) {
        self.window = Window::default();
        self.next_frame = None;
        self.fully_buffered = false;
    }

    fn frame_layout(&mut self) -> Result<FrameLayout, FeatureError> {
        if let Some(layout) = self.layout {
            return Ok(layout);
        }
        let layout = self.source.layout()?;
        self.layout = Some(layout);
        Ok(layout)
    }

    /// Oldest index a seek may target
    fn oldest_reachable(&self) -> u64 {
        match self.historic {
            HistoricMode::Unlimited => 0,
            HistoricMode::Limited { size } => self.last_feature_index.saturating_sub(size),
        }
    }

    /// Consume a latched seek; `Err(target)` when it fell out of history
    fn apply_pending_seek(&mut self) -> Result<(), u64> {
        let pending = std::mem::replace(&mut self.cursor, Cursor::Streaming);
        if let Cursor::SeekPending { target } = pending {
            if target < self.oldest_reachable() {
                return Err(target);
            }
            self.feature_index = target;
        }
        Ok(())
    }

    fn advance(&mut self, step: u64) {
        self.feature_index = self.feature_index.saturating_add(step);
        if self.feature_index > self.last_feature_index {
            self.last_feature_index = self.feature_index;
        }
    }

    fn ensure_sized(&mut self, layout: FrameLayout) {
        if self.sized {
            return;
        }
        let current = self.buffer.get().len();
        let budget = match (self.buffer.is_owned(), self.buffer_bytes, self.mem_alloc) {
            (false, _, _) => current,
            (true, Some(bytes), _) => (bytes / SAMPLE_BYTES) as usize,
            (true, None, Some(budget)) => {
                let needed = layout.feature_count.saturating_mul(layout.frame_bytes());
                (budget.min(needed) / SAMPLE_BYTES) as usize
            }
            (true, None, None) => current,
        };
        let samples = budget.max(layout.vect_size);
        if samples != current {
            self.buffer.get_mut().resize(samples);
        }
        self.sized = true;
        debug!(
            "{}: buffer holds {} samples ({} frames)",
            self.source.name(),
            samples,
            samples / layout.vect_size
        );
    }

    fn partial_window_error(&self, layout: FrameLayout) -> FeatureError {
        FeatureError::WriteForbidden(format!(
            "{}: only frames [{}, {}) of {} are buffered",
            self.source.name(),
            self.window.start,
            self.window.start + self.window.stored,
            layout.feature_count
        ))
    }

    /// Make frame `index` resident and return its sample offset in the buffer
    ///
    /// `index` must be below the feature count.
    fn load_window(&mut self, index: u64, layout: FrameLayout) -> Result<usize, FeatureError> {
        self.ensure_sized(layout);
        if !self.window.contains(index) {
            let capacity = self.buffer.get().len() as u64 / layout.vect_size as u64;
            // Near the end, slide back so the buffer is filled
            let start = if layout.feature_count - index < capacity {
                layout.feature_count.saturating_sub(capacity)
            } else {
                index
            };
            self.fill_window(start, capacity, layout)?;
            if !self.window.contains(index) {
                return Err(FeatureError::InvalidData(format!(
                    "{}: frame {} is missing, the source is shorter than announced",
                    self.source.name(),
                    index
                )));
            }
        }
        Ok(((index - self.window.start) * layout.vect_size as u64) as usize)
    }

    fn fill_window(
        &mut self,
        start: u64,
        capacity: u64,
        layout: FrameLayout,
    ) -> Result<(), FeatureError> {
        let vect_size = layout.vect_size;
        let reposition = self.next_frame != Some(start);
        let target = &mut self.buffer.get_mut().as_mut_slice()[..capacity as usize * vect_size];

        let samples = match self.source.backing() {
            Backing::Channel(channel) => {
                if reposition || !channel.is_open() {
                    channel.seek(layout.offset_of(start))?;
                }
                channel.read_some_floats(target)?
            }
            Backing::Decoded(frames) => {
                if reposition {
                    frames.seek_frame(start)?;
                }
                frames.read_samples(target)?
            }
        };

        let stored = (samples / vect_size) as u64;
        self.window = Window { start, stored };
        self.next_frame = (stored == capacity && samples % vect_size == 0).then_some(start + stored);
        let expected = capacity.min(layout.feature_count - start);
        if stored < expected {
            warn!(
                "{}: expected {} frames at {}, read {}",
                self.source.name(),
                expected,
                start,
                stored
            );
        }
        debug!(
            "{}: buffered frames [{}, {}) of {}{}",
            self.source.name(),
            start,
            start + stored,
            layout.feature_count,
            if reposition { " after repositioning" } else { "" }
        );

        self.fully_buffered = start == 0 && stored == layout.feature_count;
        if self.fully_buffered {
            self.source.backing().close();
            self.next_frame = None;
            debug!("{}: all frames buffered, source closed", self.source.name());
        }
        Ok(())
    }
}

impl<'a, S: FeatureSource> FeatureStream for BufferedFeatureStream<'a, S> {
    fn read_feature_step(&mut self, out: &mut Feature, step: u64) -> Result<bool, FeatureError> {
        if let Err(target) = self.apply_pending_seek() {
            warn!(
                "{}: feature {} is out of history (oldest reachable is {})",
                self.source.name(),
                target,
                self.oldest_reachable()
            );
            out.set_valid(false);
            self.status = StreamStatus::OutOfHistory;
            return Ok(true);
        }

        let layout = self.frame_layout()?;
        let index = self.feature_index;
        if index >= layout.feature_count {
            return Ok(false);
        }

        let offset = self.load_window(index, layout)?;
        out.load_samples(&self.buffer.get().as_slice()[offset..offset + layout.vect_size]);
        self.advance(step);

        if let Some(labels) = &self.labels {
            let code = labels.borrow_mut().add_label(self.source.name());
            out.set_label_code(Some(code));
        }
        self.status = StreamStatus::NoError;
        Ok(true)
    }

    fn write_feature_step(&mut self, value: &Feature, step: u64) -> Result<(), FeatureError> {
        let layout = self.frame_layout()?;
        if value.vect_size() != layout.vect_size {
            return Err(FeatureError::DimensionMismatch {
                expected: layout.vect_size,
                actual: value.vect_size(),
            });
        }
        if let Err(target) = self.apply_pending_seek() {
            return Err(FeatureError::OutOfHistory {
                index: target,
                oldest: self.oldest_reachable(),
            });
        }

        let index = self.feature_index;
        if index >= layout.feature_count {
            return Err(FeatureError::WriteForbidden(format!(
                "{}: feature {} is past the end ({} features)",
                self.source.name(),
                index,
                layout.feature_count
            )));
        }
        // A refill can only make the stream writable if it holds every frame
        self.ensure_sized(layout);
        let capacity = self.buffer.get().len() as u64 / layout.vect_size as u64;
        if !self.fully_buffered && capacity < layout.feature_count {
            return Err(self.partial_window_error(layout));
        }
        let offset = self.load_window(index, layout)?;
        if !self.fully_buffered {
            return Err(self.partial_window_error(layout));
        }

        let slot = &mut self.buffer.get_mut().as_mut_slice()[offset..offset + layout.vect_size];
        for (dst, &src) in slot.iter_mut().zip(value.values()) {
            *dst = src as f32;
        }
        self.advance(step);
        self.status = StreamStatus::NoError;
        Ok(())
    }

    fn seek_feature(&mut self, index: u64) {
        self.cursor = Cursor::SeekPending { target: index };
    }

    fn feature_count(&mut self) -> Result<u64, FeatureError> {
        Ok(self.frame_layout()?.feature_count)
    }

    fn vect_size(&mut self) -> Result<usize, FeatureError> {
        Ok(self.frame_layout()?.vect_size)
    }
}
