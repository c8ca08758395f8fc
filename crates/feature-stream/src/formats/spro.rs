//! SPro Feature Files
//!
//! Binary header: `dim: u16`, `flag: u32`, `frameRate: f32`. SPro4 files may
//! prefix it with a text block opened by `<header>` and closed by a
//! `</header>` line.

use super::{ordered, FrameLayout};
use crate::error::FeatureError;
use file_channel::{ByteOrder, ChannelError, FileChannel};
use std::io::{self, Write};

const TEXT_HEADER_OPEN: &str = "<header>";
const TEXT_HEADER_CLOSE: &str = "</header>";

/// Size of the binary header
pub(super) const BINARY_HEADER_LENGTH: u64 = 2 + 4 + 4;

pub(super) fn read_layout(
    channel: &mut FileChannel,
    allow_text_header: bool,
) -> Result<FrameLayout, FeatureError> {
    let length = channel.length()?;
    channel.seek(0)?;

    let mut text_length = 0;
    if allow_text_header && length >= TEXT_HEADER_OPEN.len() as u64 {
        if channel.read_fixed_string(TEXT_HEADER_OPEN.len())? == TEXT_HEADER_OPEN {
            loop {
                let line = channel.read_line().map_err(|err| match err {
                    ChannelError::EndOfFile => {
                        FeatureError::InvalidData("unterminated SPro4 text header".to_string())
                    }
                    other => other.into(),
                })?;
                if line.trim() == TEXT_HEADER_CLOSE {
                    break;
                }
            }
            text_length = channel.position()?;
        } else {
            channel.seek(0)?;
        }
    }

    let dim = channel.read_u16()?;
    let _flag = channel.read_u32()?;
    let _frame_rate = channel.read_f32()?;
    if dim == 0 {
        return Err(FeatureError::InvalidData("SPro dimension is 0".to_string()));
    }
    FrameLayout::from_length(dim as usize, text_length + BINARY_HEADER_LENGTH, length)
}

pub(crate) fn write_header<W: Write>(
    out: &mut W,
    order: ByteOrder,
    vect_size: usize,
    flag: u32,
    frame_rate: f32,
    text_fields: &[(String, String)],
) -> io::Result<()> {
    let dim = u16::try_from(vect_size).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("vector size {} is too large for SPro", vect_size),
        )
    })?;
    if !text_fields.is_empty() {
        writeln!(out, "{}", TEXT_HEADER_OPEN)?;
        for (key, value) in text_fields {
            writeln!(out, "{} = {}", key, value)?;
        }
        writeln!(out, "{}", TEXT_HEADER_CLOSE)?;
    }
    out.write_all(&ordered(dim.to_ne_bytes(), order))?;
    out.write_all(&ordered(flag.to_ne_bytes(), order))?;
    out.write_all(&ordered(frame_rate.to_ne_bytes(), order))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spro_file(fields: &[(String, String)], vect_size: usize, frames: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write_header(&mut file, ByteOrder::Little, vect_size, 0, 100.0, fields).unwrap();
        file.write_all(&vec![0u8; vect_size * frames * 4]).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_spro3_header() {
        let file = spro_file(&[], 13, 5);
        let mut channel = FileChannel::with_byte_order(file.path(), ByteOrder::Little);
        let layout = read_layout(&mut channel, false).unwrap();
        assert_eq!(layout.vect_size, 13);
        assert_eq!(layout.feature_count, 5);
        assert_eq!(layout.header_length, BINARY_HEADER_LENGTH);
    }

    #[test]
    fn test_spro4_text_header() {
        let fields = vec![
            ("source".to_string(), "spk01.sph".to_string()),
            ("window".to_string(), "20ms".to_string()),
        ];
        let file = spro_file(&fields, 4, 3);
        let text = "<header>\nsource = spk01.sph\nwindow = 20ms\n</header>\n";
        let mut channel = FileChannel::with_byte_order(file.path(), ByteOrder::Little);
        let layout = read_layout(&mut channel, true).unwrap();
        assert_eq!(layout.header_length, text.len() as u64 + BINARY_HEADER_LENGTH);
        assert_eq!(layout.vect_size, 4);
        assert_eq!(layout.feature_count, 3);
    }

    #[test]
    fn test_spro4_without_text_header() {
        let file = spro_file(&[], 2, 8);
        let mut channel = FileChannel::with_byte_order(file.path(), ByteOrder::Little);
        let layout = read_layout(&mut channel, true).unwrap();
        assert_eq!(layout.header_length, BINARY_HEADER_LENGTH);
        assert_eq!(layout.feature_count, 8);
    }

    #[test]
    fn test_unterminated_text_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<header>\nkey = value\n").unwrap();
        file.flush().unwrap();
        let mut channel = FileChannel::new(file.path());
        assert!(matches!(
            read_layout(&mut channel, true),
            Err(FeatureError::InvalidData(_))
        ));
    }
}
