//! Matrix Persistence
//!
//! Two formats:
//! - dense text: a `rows cols` line followed by one line of values per row
//! - dense binary: `rows` and `cols` as little-endian `u32`, then the
//!   elements row-major in little-endian order

use crate::element::Element;
use crate::error::MatrixError;
use crate::matrix::Matrix;
use file_channel::{ByteOrder, ChannelError, FileChannel};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Dimension header of the binary format
const BINARY_HEADER_BYTES: u64 = 8;

/// Upper bound on the up-front allocation of a text load
const TEXT_PREALLOC_LIMIT: usize = 1 << 16;

fn element_count(rows: usize, cols: usize) -> Result<usize, MatrixError> {
    rows.checked_mul(cols).ok_or_else(|| {
        MatrixError::Parse(format!("{}x{} matrix is too large", rows, cols))
    })
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
}

fn parse_field<V: std::str::FromStr>(field: &str, line: usize) -> Result<V, MatrixError> {
    field
        .parse()
        .map_err(|_| MatrixError::Parse(format!("line {}: cannot parse '{}'", line, field)))
}

impl<T: Element> Matrix<T> {
    /// Load a dense text matrix
    pub fn load_text(path: impl AsRef<Path>) -> Result<Self, MatrixError> {
        let mut channel = FileChannel::new(path.as_ref());
        let header = channel.read_line()?;
        let dims: Vec<usize> = split_fields(&header)
            .map(|f| parse_field(f, 1))
            .collect::<Result<_, _>>()?;
        let &[rows, cols] = dims.as_slice() else {
            return Err(MatrixError::Parse(format!(
                "line 1: expected 'rows cols', got '{}'",
                header
            )));
        };

        let total = element_count(rows, cols)?;
        // Header is untrusted, grow with the rows actually present
        let mut data = Vec::with_capacity(total.min(TEXT_PREALLOC_LIMIT));
        let mut line_no = 1;
        while data.len() < total {
            let line = match channel.read_line() {
                Ok(line) => line,
                Err(ChannelError::EndOfFile) => break,
                Err(err) => return Err(err.into()),
            };
            line_no += 1;
            let before = data.len();
            for field in split_fields(&line) {
                data.push(parse_field::<T>(field, line_no)?);
            }
            if data.len() != before && data.len() - before != cols {
                return Err(MatrixError::Parse(format!(
                    "line {}: expected {} values, got {}",
                    line_no,
                    cols,
                    data.len() - before
                )));
            }
        }
        if data.len() != total {
            return Err(MatrixError::Parse(format!(
                "expected {} rows, got {}",
                rows,
                data.len() / cols.max(1)
            )));
        }
        debug!("Loaded {}x{} text matrix from {}", rows, cols, path.as_ref().display());
        Matrix::from_vec(rows, cols, data)
    }

    /// Save as a dense text matrix
    pub fn save_text(&self, path: impl AsRef<Path>) -> Result<(), MatrixError> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{} {}", self.rows(), self.cols())?;
        for r in 0..self.rows() {
            let line: Vec<String> = self.row(r).iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", line.join(" "))?;
        }
        out.flush()?;
        Ok(())
    }

    /// Load a dense binary matrix
    pub fn load_binary(path: impl AsRef<Path>) -> Result<Self, MatrixError> {
        let mut channel = FileChannel::with_byte_order(path.as_ref(), ByteOrder::Little);
        let rows = channel.read_u32()? as usize;
        let cols = channel.read_u32()? as usize;
        let total = element_count(rows, cols)?;
        let payload = channel.length()?.saturating_sub(BINARY_HEADER_BYTES);
        let expected = (total as u64).checked_mul(std::mem::size_of::<T>() as u64);
        if expected != Some(payload) {
            return Err(MatrixError::Parse(format!(
                "{}x{} binary matrix needs {} payload bytes, file has {}",
                rows,
                cols,
                expected.map_or_else(|| "too many".to_string(), |n| n.to_string()),
                payload
            )));
        }
        let mut data = Vec::with_capacity(total);
        for _ in 0..total {
            data.push(T::read_from(&mut channel)?);
        }
        debug!("Loaded {}x{} binary matrix from {}", rows, cols, path.as_ref().display());
        Matrix::from_vec(rows, cols, data)
    }

    /// Save as a dense binary matrix
    pub fn save_binary(&self, path: impl AsRef<Path>) -> Result<(), MatrixError> {
        let rows = u32::try_from(self.rows())
            .map_err(|_| MatrixError::Io(format!("{} rows exceed the format", self.rows())))?;
        let cols = u32::try_from(self.cols())
            .map_err(|_| MatrixError::Io(format!("{} cols exceed the format", self.cols())))?;
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&rows.to_le_bytes())?;
        out.write_all(&cols.to_le_bytes())?;
        for &v in self.as_slice() {
            v.write_le(&mut out)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Matrix<f64> {
        Matrix::from_rows(&[vec![1.5, -2.0, 0.1], vec![3.0, 4.25, 1e-7]]).unwrap()
    }

    #[test]
    fn test_text_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        let m = sample();
        m.save_text(&path).unwrap();
        assert_eq!(Matrix::<f64>::load_text(&path).unwrap(), m);
    }

    #[test]
    fn test_text_accepts_commas_and_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        std::fs::write(&path, "2,2\n1, 2\n\n3,4").unwrap();
        let m = Matrix::<f32>::load_text(&path).unwrap();
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_text_rejects_short_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        std::fs::write(&path, "2 2\n1 2 3\n4 5\n").unwrap();
        assert!(matches!(
            Matrix::<f64>::load_text(&path),
            Err(MatrixError::Parse(_))
        ));
        std::fs::write(&path, "2 2\n1 2\n").unwrap();
        assert!(matches!(
            Matrix::<f64>::load_text(&path),
            Err(MatrixError::Parse(_))
        ));
        std::fs::write(&path, "two 2\n").unwrap();
        assert!(matches!(
            Matrix::<f64>::load_text(&path),
            Err(MatrixError::Parse(_))
        ));
    }

    #[test]
    fn test_binary_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.bin");
        let m = Matrix::from_rows(&[vec![1.0f32, 2.0]]).unwrap();
        m.save_binary(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8 + 2 * 4);
        assert_eq!(&bytes[..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2.0f32.to_le_bytes());

        assert_eq!(Matrix::<f32>::load_binary(&path).unwrap(), m);
    }

    #[test]
    fn test_binary_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.bin");
        sample().save_binary(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(matches!(
            Matrix::<f64>::load_binary(&path),
            Err(MatrixError::Parse(_))
        ));
        std::fs::write(&path, &bytes[..6]).unwrap();
        assert!(matches!(
            Matrix::<f64>::load_binary(&path),
            Err(MatrixError::Channel(ChannelError::EndOfFile))
        ));
    }

    #[test]
    fn test_binary_huge_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.bin");
        let mut bytes = u32::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            Matrix::<f64>::load_binary(&path),
            Err(MatrixError::Parse(_))
        ));

        // Announces more data than the file holds
        let mut bytes = 1000u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1000u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            Matrix::<f64>::load_binary(&path),
            Err(MatrixError::Parse(_))
        ));
    }

    #[test]
    fn test_text_huge_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        std::fs::write(&path, "99999999999 99999999999\n1 2\n").unwrap();
        assert!(matches!(
            Matrix::<f64>::load_text(&path),
            Err(MatrixError::Parse(_))
        ));

        std::fs::write(&path, "100000 100000\n1 2\n").unwrap();
        assert!(matches!(
            Matrix::<f64>::load_text(&path),
            Err(MatrixError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Matrix::<f64>::load_text("/no/such/matrix.txt"),
            Err(MatrixError::Channel(ChannelError::FileNotFound(_)))
        ));
    }
}
