//! Frame and stream format selectors
//!
//! Discriminants match the SDK's enums so a validated value can be passed
//! straight into native configuration. Each axis accepts an explicit,
//! finite set; anything else is rejected before the native call.

use crate::embedding::{Embedding, ValueKind};
use crate::error::{BridgeError, Result};
use thiserror::Error;

/// A finite set of accepted SDK enum values
pub trait FormatAxis: Copy + Sized + 'static {
    /// Human readable axis name used in error messages
    const AXIS: &'static str;

    /// Every accepted member on this platform
    const ACCEPTED: &'static [Self];

    /// SDK discriminant
    fn raw(self) -> i32;

    fn from_raw(raw: i32) -> Option<Self> {
        Self::ACCEPTED.iter().copied().find(|f| f.raw() == raw)
    }
}

/// Raw value outside an axis' accepted set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{value} is not a valid {axis}")]
pub struct InvalidFormat {
    pub axis: &'static str,
    pub value: i32,
}

/// Receive color format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ColorFormat {
    BgrxBgra = 0,
    UyvyBgra = 1,
    RgbxRgba = 2,
    UyvyRgba = 3,
    Fastest = 100,
    /// Vertically flipped BGRX/BGRA, only offered by the Windows SDK
    #[cfg(windows)]
    BgrxBgraFlipped = 200,
}

impl FormatAxis for ColorFormat {
    const AXIS: &'static str = "color format";
    const ACCEPTED: &'static [Self] = &[
        ColorFormat::BgrxBgra,
        ColorFormat::UyvyBgra,
        ColorFormat::RgbxRgba,
        ColorFormat::UyvyRgba,
        ColorFormat::Fastest,
        #[cfg(windows)]
        ColorFormat::BgrxBgraFlipped,
    ];

    fn raw(self) -> i32 {
        self as i32
    }
}

/// Receive bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Bandwidth {
    MetadataOnly = -10,
    AudioOnly = 10,
    Lowest = 0,
    Highest = 100,
}

impl FormatAxis for Bandwidth {
    const AXIS: &'static str = "bandwidth";
    const ACCEPTED: &'static [Self] = &[
        Bandwidth::MetadataOnly,
        Bandwidth::AudioOnly,
        Bandwidth::Lowest,
        Bandwidth::Highest,
    ];

    fn raw(self) -> i32 {
        self as i32
    }
}

/// Video frame scan type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FrameFormat {
    Interleaved = 0,
    Progressive = 1,
    Field0 = 2,
    Field1 = 3,
}

impl FormatAxis for FrameFormat {
    const AXIS: &'static str = "frame format";
    const ACCEPTED: &'static [Self] = &[
        FrameFormat::Progressive,
        FrameFormat::Interleaved,
        FrameFormat::Field0,
        FrameFormat::Field1,
    ];

    fn raw(self) -> i32 {
        self as i32
    }
}

/// Sample layout delivered for audio frames
///
/// Not an SDK enum: the bridge converts audio into one of these layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum AudioFormat {
    #[default]
    Float32Separate = 0,
    Int16Interleaved = 1,
    Float32Interleaved = 2,
}

impl FormatAxis for AudioFormat {
    const AXIS: &'static str = "audio format";
    const ACCEPTED: &'static [Self] = &[
        AudioFormat::Float32Separate,
        AudioFormat::Int16Interleaved,
        AudioFormat::Float32Interleaved,
    ];

    fn raw(self) -> i32 {
        self as i32
    }
}

macro_rules! impl_try_from_raw {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TryFrom<i32> for $ty {
                type Error = InvalidFormat;

                fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
                    <$ty as FormatAxis>::from_raw(value).ok_or(InvalidFormat {
                        axis: <$ty as FormatAxis>::AXIS,
                        value,
                    })
                }
            }
        )+
    };
}

impl_try_from_raw!(ColorFormat, Bandwidth, FrameFormat, AudioFormat);

pub fn valid_color_format(raw: i32) -> bool {
    ColorFormat::from_raw(raw).is_some()
}

pub fn valid_bandwidth(raw: i32) -> bool {
    Bandwidth::from_raw(raw).is_some()
}

pub fn valid_frame_format(raw: i32) -> bool {
    FrameFormat::from_raw(raw).is_some()
}

pub fn valid_audio_format(raw: i32) -> bool {
    AudioFormat::from_raw(raw).is_some()
}

/// Read an optional format selector for `method`
///
/// Anything that is not a number reads as absent so the caller can apply
/// its default. A number outside the accepted set is an argument error.
pub fn read_format<E: Embedding, F: FormatAxis>(
    env: &E,
    method: &str,
    argument: &str,
    value: E::Value,
) -> Result<Option<F>> {
    if env.type_of(value)? != ValueKind::Number {
        return Ok(None);
    }
    let raw = env.number_i32(value)?;
    F::from_raw(raw)
        .map(Some)
        .ok_or_else(|| BridgeError::ArgumentValue {
            method: method.to_string(),
            argument: argument.to_string(),
            axis: F::AXIS,
            value: i64::from(raw),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalRuntime;

    fn assert_axis<F: FormatAxis>(valid: fn(i32) -> bool, sdk_values: &[i32], sentinels: &[i32]) {
        for &raw in sdk_values {
            assert!(valid(raw), "{} {} rejected", F::AXIS, raw);
        }
        assert_eq!(F::ACCEPTED.len(), sdk_values.len(), "{} set size", F::AXIS);
        for &raw in sentinels {
            assert!(!valid(raw), "{} {} accepted", F::AXIS, raw);
        }
    }

    #[test]
    fn test_color_format() {
        let mut sdk_values = vec![0, 1, 2, 3, 100];
        if cfg!(windows) {
            sdk_values.push(200);
        }
        assert_axis::<ColorFormat>(valid_color_format, &sdk_values, &[-1, 4, 101, 1000]);
    }

    #[test]
    fn test_flipped_color_format_is_platform_specific() {
        assert_eq!(valid_color_format(200), cfg!(windows));
    }

    #[test]
    fn test_bandwidth() {
        assert_axis::<Bandwidth>(valid_bandwidth, &[-10, 10, 0, 100], &[-11, 1, 11, 50, 101]);
        assert_eq!(Bandwidth::try_from(-10), Ok(Bandwidth::MetadataOnly));
    }

    #[test]
    fn test_frame_format() {
        assert_axis::<FrameFormat>(valid_frame_format, &[0, 1, 2, 3], &[-1, 4, 100]);
        assert_eq!(
            FrameFormat::try_from(7),
            Err(InvalidFormat {
                axis: "frame format",
                value: 7
            })
        );
    }

    #[test]
    fn test_audio_format() {
        assert_axis::<AudioFormat>(valid_audio_format, &[0, 1, 2], &[-1, 3, 16]);
        assert_eq!(AudioFormat::default(), AudioFormat::Float32Separate);
    }

    #[test]
    fn test_read_format() {
        let rt = LocalRuntime::new();

        let value = rt.number(100.0);
        let bw: Option<Bandwidth> = read_format(&rt, "receive", "bandwidth", value).unwrap();
        assert_eq!(bw, Some(Bandwidth::Highest));

        let absent = rt.undefined_value();
        let bw: Option<Bandwidth> = read_format(&rt, "receive", "bandwidth", absent).unwrap();
        assert_eq!(bw, None);

        let bad = rt.number(42.0);
        let err = read_format::<_, Bandwidth>(&rt, "receive", "bandwidth", bad).unwrap_err();
        assert_eq!(
            err.to_string(),
            "For method receive, bandwidth value 42 is not a valid bandwidth."
        );
    }
}
