//! Headerless RAW Feature Files

use super::FrameLayout;
use crate::error::FeatureError;
use crate::settings::keys;
use file_channel::FileChannel;

/// RAW files carry no header, so the vector size must be configured
pub(super) fn read_layout(
    channel: &mut FileChannel,
    vect_size: Option<usize>,
) -> Result<FrameLayout, FeatureError> {
    let vect_size = vect_size.ok_or_else(|| {
        FeatureError::InvalidConfig(format!(
            "{} is required for RAW feature files",
            keys::VECT_SIZE
        ))
    })?;
    FrameLayout::from_length(vect_size, 0, channel.length()?)
}
