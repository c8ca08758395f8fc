//! Numeric Element Trait

use file_channel::{ChannelError, FileChannel};
use std::fmt::{Debug, Display};
use std::io::{self, Write};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Floating-point element stored in vectors and matrices
pub trait Element:
    Copy
    + Default
    + PartialEq
    + PartialOrd
    + Debug
    + Display
    + FromStr
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + 'static
{
    const ZERO: Self;
    const ONE: Self;

    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;

    /// Read one element through the channel's byte order
    fn read_from(channel: &mut FileChannel) -> Result<Self, ChannelError>;

    /// Write one element in little-endian order
    fn write_le<W: Write>(self, out: &mut W) -> io::Result<()>;
}

macro_rules! impl_element {
    ($t:ty, $read:ident) => {
        impl Element for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn read_from(channel: &mut FileChannel) -> Result<Self, ChannelError> {
                channel.$read()
            }

            fn write_le<W: Write>(self, out: &mut W) -> io::Result<()> {
                out.write_all(&self.to_le_bytes())
            }
        }
    };
}

impl_element!(f32, read_f32);
impl_element!(f64, read_f64);
