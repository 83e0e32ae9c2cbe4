//! Core types with newtype pattern for type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

use crate::error::ConfigError;

/// Sample encoding of an audio stream.
///
/// Internal mixing always happens in `f64`; the format only matters at the
/// decode-in and encode-out boundaries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Unsigned 8-bit (offset binary).
    U8,
    /// Signed 8-bit.
    S8,
    /// Unsigned 16-bit little-endian (offset binary).
    U16,
    /// Signed 16-bit little-endian.
    S16,
    /// Signed 32-bit little-endian.
    S32,
    /// IEEE 32-bit float little-endian.
    F32,
    /// IEEE 64-bit float little-endian.
    F64,
}

impl SampleFormat {
    /// Size of one encoded sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::S8 => 1,
            Self::U16 | Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Encoded bit width.
    pub fn bits_per_sample(self) -> u16 {
        self.bytes_per_sample() as u16 * 8
    }

    /// Whether samples are IEEE floats (as opposed to integer PCM).
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::S8 => "s8",
            Self::U16 => "u16",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        write!(f, "{name}")
    }
}

/// Output format descriptor: frequency, sample format, channel count.
///
/// Immutable for the lifetime of a mixer run; set once at construction.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioSpec {
    /// Playback frequency in Hz.
    pub freq: f64,
    /// Sample encoding at the output boundary.
    pub format: SampleFormat,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl AudioSpec {
    pub fn new(freq: f64, format: SampleFormat, channels: u16) -> Self {
        Self {
            freq,
            format,
            channels,
        }
    }

    /// Validate the spec: frequency must be positive and finite, and there
    /// must be at least one channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.freq.is_finite() || self.freq <= 0.0 {
            return Err(ConfigError::InvalidFreq(self.freq));
        }
        if self.channels == 0 {
            return Err(ConfigError::InvalidChannels(self.channels));
        }
        Ok(())
    }
}

impl fmt::Display for AudioSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}/{}ch", self.freq, self.format, self.channels)
    }
}

/// Sample index: nonnegative count of frames since the mixer epoch.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tz(pub u64);

impl Tz {
    pub const ZERO: Self = Self(0);

    /// Resolve a wall-clock duration to a sample index at the given frequency.
    ///
    /// Scheduling is resolved to `Tz` at insertion time; `Duration` is only
    /// an input vocabulary.
    pub fn from_duration(d: Duration, freq: f64) -> Self {
        Self((d.as_secs_f64() * freq).round() as u64)
    }

    /// Like [`from_duration`](Self::from_duration) but truncating, for
    /// render-up-to bounds.
    pub fn from_duration_floor(d: Duration, freq: f64) -> Self {
        Self((d.as_secs_f64() * freq).floor() as u64)
    }

    /// The wall-clock duration this index corresponds to.
    pub fn as_duration(self, freq: f64) -> Duration {
        Duration::from_secs_f64(self.0 as f64 / freq)
    }
}

impl Add<u64> for Tz {
    type Output = Self;
    fn add(self, rhs: u64) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for Tz {
    type Output = i64;
    fn sub(self, rhs: Self) -> i64 {
        self.0 as i64 - rhs.0 as i64
    }
}

impl fmt::Display for Tz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_tz_rounds() {
        let tz = Tz::from_duration(Duration::from_secs(1), 48000.0);
        assert_eq!(tz, Tz(48000));

        // 1.5 samples rounds up
        let tz = Tz::from_duration(Duration::from_secs_f64(1.5 / 48000.0), 48000.0);
        assert_eq!(tz, Tz(2));
    }

    #[test]
    fn duration_to_tz_floor() {
        let tz = Tz::from_duration_floor(Duration::from_secs_f64(1.9 / 48000.0), 48000.0);
        assert_eq!(tz, Tz(1));
    }

    #[test]
    fn tz_roundtrip() {
        let tz = Tz(96000);
        let d = tz.as_duration(48000.0);
        assert!((d.as_secs_f64() - 2.0).abs() < 1e-12);
        assert_eq!(Tz::from_duration(d, 48000.0), tz);
    }

    #[test]
    fn tz_sub_is_signed() {
        assert_eq!(Tz(10) - Tz(4), 6);
        assert_eq!(Tz(4) - Tz(10), -6);
    }

    #[test]
    fn tz_add_frames() {
        assert_eq!(Tz(10) + 5, Tz(15));
    }

    #[test]
    fn spec_validation() {
        let good = AudioSpec::new(48000.0, SampleFormat::F32, 2);
        assert!(good.validate().is_ok());

        let bad_freq = AudioSpec::new(0.0, SampleFormat::F32, 2);
        assert!(matches!(
            bad_freq.validate(),
            Err(ConfigError::InvalidFreq(_))
        ));

        let bad_ch = AudioSpec::new(48000.0, SampleFormat::F32, 0);
        assert!(matches!(
            bad_ch.validate(),
            Err(ConfigError::InvalidChannels(0))
        ));

        let nan_freq = AudioSpec::new(f64::NAN, SampleFormat::F32, 2);
        assert!(nan_freq.validate().is_err());
    }

    #[test]
    fn format_widths() {
        assert_eq!(SampleFormat::U8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::S32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::F64.bytes_per_sample(), 8);
        assert_eq!(SampleFormat::S16.bits_per_sample(), 16);
        assert!(SampleFormat::F32.is_float());
        assert!(!SampleFormat::S16.is_float());
    }

    #[test]
    fn spec_display() {
        let spec = AudioSpec::new(48000.0, SampleFormat::F32, 2);
        assert_eq!(spec.to_string(), "48000Hz/f32/2ch");
    }
}
