//! Stream formats.

use core::fmt;
use core::str::FromStr;
use std::time::Duration;

use crate::error::FormatError;
use crate::fixed::FRAC_ONE;
use crate::timeline::TimelineRate;

/// Minimum supported channel count.
pub const MIN_CHANNELS: u32 = 1;
/// Maximum supported channel count.
pub const MAX_CHANNELS: u32 = 8;
/// Minimum supported frame rate in Hz.
pub const MIN_FRAME_RATE: u32 = 1_000;
/// Maximum supported frame rate in Hz.
pub const MAX_FRAME_RATE: u32 = 192_000;

const NS_PER_SECOND: u64 = 1_000_000_000;

/// Sample representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 0x80.
    Unsigned8,
    /// Signed 16-bit.
    Signed16,
    /// Signed 24-bit, left-justified in 32 bits.
    Signed24In32,
    /// 32-bit float, nominal range [-1, 1].
    #[default]
    Float,
}

impl SampleFormat {
    /// All formats.
    pub const ALL: [SampleFormat; 4] = [
        SampleFormat::Unsigned8,
        SampleFormat::Signed16,
        SampleFormat::Signed24In32,
        SampleFormat::Float,
    ];

    /// Storage size of one sample.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Unsigned8 => 1,
            SampleFormat::Signed16 => 2,
            SampleFormat::Signed24In32 | SampleFormat::Float => 4,
        }
    }

    /// Canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Unsigned8 => "unsigned8",
            SampleFormat::Signed16 => "signed16",
            SampleFormat::Signed24In32 => "signed24_in32",
            SampleFormat::Float => "float",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsigned8" | "u8" => Ok(SampleFormat::Unsigned8),
            "signed16" | "s16" | "i16" => Ok(SampleFormat::Signed16),
            "signed24_in32" | "s24in32" | "s24" | "i24" => Ok(SampleFormat::Signed24In32),
            "float" | "f32" => Ok(SampleFormat::Float),
            _ => Err(FormatError::UnknownSampleFormat(s.to_string())),
        }
    }
}

/// Sample format, channel count and frame rate of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Format {
    sample_format: SampleFormat,
    channels: u32,
    frames_per_second: u32,
}

impl Format {
    /// Creates a validated format.
    pub fn new(
        sample_format: SampleFormat,
        channels: u32,
        frames_per_second: u32,
    ) -> Result<Self, FormatError> {
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&channels) {
            return Err(FormatError::InvalidChannels(channels));
        }
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&frames_per_second) {
            return Err(FormatError::InvalidFrameRate(frames_per_second));
        }
        Ok(Self {
            sample_format,
            channels,
            frames_per_second,
        })
    }

    /// Float format shorthand.
    pub fn float(channels: u32, frames_per_second: u32) -> Result<Self, FormatError> {
        Self::new(SampleFormat::Float, channels, frames_per_second)
    }

    /// Sample representation.
    pub const fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Channels per frame.
    pub const fn channels(&self) -> u32 {
        self.channels
    }

    /// Frame rate in Hz.
    pub const fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    /// Bytes in one frame.
    pub const fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels as usize
    }

    /// Integral frames per nanosecond.
    pub const fn frames_per_ns(&self) -> TimelineRate {
        TimelineRate::new(self.frames_per_second as u64, NS_PER_SECOND)
    }

    /// Fractional frames per nanosecond, the slope of a stream's
    /// reference-time-to-frame timeline when running at nominal rate.
    pub const fn frac_frames_per_ns(&self) -> TimelineRate {
        TimelineRate::new(self.frames_per_second as u64 * FRAC_ONE as u64, NS_PER_SECOND)
    }

    /// Whole frames needed to cover `duration`, rounded up.
    pub fn frames_for(&self, duration: Duration) -> i64 {
        let frames = duration.as_nanos() * u128::from(self.frames_per_second);
        i64::try_from(frames.div_ceil(u128::from(NS_PER_SECOND))).unwrap_or(i64::MAX)
    }

    /// Duration of `frames` frames, rounded up to the next nanosecond.
    pub fn duration_of(&self, frames: i64) -> Duration {
        let frames = frames.max(0) as u128;
        let nanos = (frames * u128::from(NS_PER_SECOND)).div_ceil(u128::from(self.frames_per_second));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}ch {}",
            self.frames_per_second, self.channels, self.sample_format
        )
    }
}
