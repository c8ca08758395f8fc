//! Feature File Writer

use crate::error::FeatureError;
use crate::feature::Feature;
use crate::formats::{ordered, write_htk_header, write_spro_header, PARM_KIND_USER};
use crate::settings::FileFormat;
use file_channel::ByteOrder;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// HTK sample period in 100ns units (10ms frames)
const HTK_SAMPLE_PERIOD: i32 = 100_000;

/// SPro frame rate in Hz
const SPRO_FRAME_RATE: f32 = 100.0;

/// Sequential writer producing files the stream adapters read back
///
/// The header is emitted on the first [`write_feature`](Self::write_feature)
/// or on [`finish`](Self::finish). HTK headers are rewritten on `finish`
/// with the final frame count, so an HTK file dropped without `finish`
/// announces zero frames.
pub struct FeatureFileWriter {
    path: PathBuf,
    format: FileFormat,
    order: ByteOrder,
    vect_size: usize,
    out: BufWriter<File>,
    text_fields: Vec<(String, String)>,
    header_written: bool,
    written: u64,
}

impl FeatureFileWriter {
    pub fn create(
        path: impl AsRef<Path>,
        format: FileFormat,
        order: ByteOrder,
        vect_size: usize,
    ) -> Result<Self, FeatureError> {
        if vect_size == 0 {
            return Err(FeatureError::InvalidConfig(
                "cannot write features of size 0".to_string(),
            ));
        }
        let path = path.as_ref().to_path_buf();
        let out = BufWriter::new(File::create(&path)?);
        debug!("Writing {:?} features to {}", format, path.display());
        Ok(Self {
            path,
            format,
            order,
            vect_size,
            out,
            text_fields: Vec::new(),
            header_written: false,
            written: 0,
        })
    }

    /// Add a `key = value` line to the SPro4 text header
    ///
    /// Ignored by other formats. Must precede the first write.
    pub fn with_header_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.text_fields.push((key.into(), value.into()));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write_feature(&mut self, feature: &Feature) -> Result<(), FeatureError> {
        if feature.vect_size() != self.vect_size {
            return Err(FeatureError::DimensionMismatch {
                expected: self.vect_size,
                actual: feature.vect_size(),
            });
        }
        self.ensure_header()?;
        for &v in feature.values() {
            self.out
                .write_all(&ordered((v as f32).to_ne_bytes(), self.order))?;
        }
        self.written += 1;
        Ok(())
    }

    /// Flush everything and return the number of frames written
    pub fn finish(mut self) -> Result<u64, FeatureError> {
        self.ensure_header()?;
        if self.format == FileFormat::Htk {
            let n_samples = i32::try_from(self.written).map_err(|_| {
                FeatureError::InvalidData(format!(
                    "{} frames do not fit an HTK header",
                    self.written
                ))
            })?;
            self.out.seek(SeekFrom::Start(0))?;
            write_htk_header(
                &mut self.out,
                self.order,
                n_samples,
                HTK_SAMPLE_PERIOD,
                self.vect_size,
                PARM_KIND_USER,
            )?;
        }
        self.out.flush()?;
        info!(
            "Wrote {} features of size {} to {}",
            self.written,
            self.vect_size,
            self.path.display()
        );
        Ok(self.written)
    }

    fn ensure_header(&mut self) -> Result<(), FeatureError> {
        if self.header_written {
            return Ok(());
        }
        match self.format {
            FileFormat::Raw => {}
            FileFormat::Htk => write_htk_header(
                &mut self.out,
                self.order,
                0,
                HTK_SAMPLE_PERIOD,
                self.vect_size,
                PARM_KIND_USER,
            )?,
            FileFormat::Spro3 => {
                write_spro_header(&mut self.out, self.order, self.vect_size, 0, SPRO_FRAME_RATE, &[])?
            }
            FileFormat::Spro4 => write_spro_header(
                &mut self.out,
                self.order,
                self.vect_size,
                0,
                SPRO_FRAME_RATE,
                &self.text_fields,
            )?,
        }
        self.header_written = true;
        Ok(())
    }
}
