//! Sample formats on both sides of the engine
//!
//! [`SampleFormat`] is what travels on the wire between host and device.
//! [`StreamFormat`] is what the application reads and writes; the element type
//! of application buffers implements [`StreamSample`].

use std::fmt;
use std::str::FromStr;

use num_complex::Complex;
use serde::Deserialize;

use crate::error::Error;

/// Device wire sample format
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
pub enum SampleFormat {
    /// Signed 16-bit Q11 I/Q pairs
    #[serde(rename = "sc16")]
    Sc16Q11,
    /// Signed 16-bit Q11 with per-buffer timestamp metadata
    #[default]
    #[serde(rename = "sc16_meta")]
    Sc16Q11Meta,
    /// Signed 8-bit Q7 I/Q pairs
    #[serde(rename = "sc8")]
    Sc8Q7,
    /// Signed 8-bit Q7 with per-buffer timestamp metadata
    #[serde(rename = "sc8_meta")]
    Sc8Q7Meta,
    /// Signed 16-bit Q11, packed to 12 bits on the wire
    #[serde(rename = "sc16_packed")]
    Sc16Q11Packed,
}

impl SampleFormat {
    /// Value of a full-scale native sample
    pub fn full_scale(&self) -> f32 {
        if self.is_8bit() { 128.0 } else { 2048.0 }
    }

    pub fn is_8bit(&self) -> bool {
        matches!(self, SampleFormat::Sc8Q7 | SampleFormat::Sc8Q7Meta)
    }

    pub fn has_metadata(&self) -> bool {
        matches!(self, SampleFormat::Sc16Q11Meta | SampleFormat::Sc8Q7Meta)
    }

    /// Short option name, as accepted by [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::Sc16Q11 => "sc16",
            SampleFormat::Sc16Q11Meta => "sc16_meta",
            SampleFormat::Sc8Q7 => "sc8",
            SampleFormat::Sc8Q7Meta => "sc8_meta",
            SampleFormat::Sc16Q11Packed => "sc16_packed",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self {
            SampleFormat::Sc16Q11 => "SC16 Q11",
            SampleFormat::Sc16Q11Meta => "SC16 Q11 META",
            SampleFormat::Sc8Q7 => "SC8 Q7",
            SampleFormat::Sc8Q7Meta => "SC8 Q7 META",
            SampleFormat::Sc16Q11Packed => "SC16 Q11 PACKED",
        };
        write!(f, "{}", desc)
    }
}

impl FromStr for SampleFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sc16" => Ok(SampleFormat::Sc16Q11),
            "sc16_meta" => Ok(SampleFormat::Sc16Q11Meta),
            "sc8" => Ok(SampleFormat::Sc8Q7),
            "sc8_meta" => Ok(SampleFormat::Sc8Q7Meta),
            "sc16_packed" => Ok(SampleFormat::Sc16Q11Packed),
            other => Err(Error::InvalidSampleFormat(other.to_string())),
        }
    }
}

/// Application-side sample representation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamFormat {
    /// Complex signed 16-bit at native scale (Cs16)
    Cs16,
    /// Complex 32-bit float normalized to [-1, 1) (Cf32)
    Cf32,
}

impl FromStr for StreamFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CS16" => Ok(StreamFormat::Cs16),
            "CF32" => Ok(StreamFormat::Cf32),
            other => Err(Error::InvalidStreamFormat(other.to_string())),
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamFormat::Cs16 => write!(f, "CS16"),
            StreamFormat::Cf32 => write!(f, "CF32"),
        }
    }
}

/// Component type of application sample buffers.
///
/// Application buffers are slices of `Complex<Self>`, one slice per channel.
pub trait StreamSample: Copy + Default + Send + 'static {
    /// Application format this type represents
    const FORMAT: StreamFormat;

    /// Convert one native component.
    fn from_native(value: i16, full_scale: f32) -> Self;

    /// Convert one component to native scale, truncating toward zero.
    fn to_native(self, full_scale: f32) -> i16;

    /// View a buffer as native 16-bit words when no conversion is needed.
    fn as_native_mut(buf: &mut [Complex<Self>]) -> Option<&mut [i16]>;

    /// Read-only counterpart of [`StreamSample::as_native_mut`].
    fn as_native(buf: &[Complex<Self>]) -> Option<&[i16]>;
}

impl StreamSample for i16 {
    const FORMAT: StreamFormat = StreamFormat::Cs16;

    #[inline]
    fn from_native(value: i16, _full_scale: f32) -> Self {
        value
    }

    #[inline]
    fn to_native(self, _full_scale: f32) -> i16 {
        self
    }

    fn as_native_mut(buf: &mut [Complex<Self>]) -> Option<&mut [i16]> {
        // SAFETY: Complex<T> is #[repr(C)] with two T fields, so a slice of
        // n Complex<i16> has the layout of 2n contiguous i16.
        Some(unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut i16, buf.len() * 2) })
    }

    fn as_native(buf: &[Complex<Self>]) -> Option<&[i16]> {
        // SAFETY: see as_native_mut
        Some(unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const i16, buf.len() * 2) })
    }
}

impl StreamSample for f32 {
    const FORMAT: StreamFormat = StreamFormat::Cf32;

    #[inline]
    fn from_native(value: i16, full_scale: f32) -> Self {
        value as f32 / full_scale
    }

    #[inline]
    fn to_native(self, full_scale: f32) -> i16 {
        (self * full_scale) as i16
    }

    fn as_native_mut(_buf: &mut [Complex<Self>]) -> Option<&mut [i16]> {
        None
    }

    fn as_native(_buf: &[Complex<Self>]) -> Option<&[i16]> {
        None
    }
}
