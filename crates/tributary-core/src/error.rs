//! Error types for formats and leaf streams.

use thiserror::Error;

use crate::format::SampleFormat;

/// Errors raised when building a [`Format`](crate::Format).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Channel count outside 1..=8.
    #[error("unsupported channel count {0} (expected 1..=8)")]
    InvalidChannels(u32),

    /// Frame rate outside 1 kHz..=192 kHz.
    #[error("unsupported frame rate {0} Hz (expected 1000..=192000)")]
    InvalidFrameRate(u32),

    /// Unrecognized sample format name.
    #[error("unknown sample format: {0}")]
    UnknownSampleFormat(String),
}

/// Errors raised when pushing packets into a [`PacketQueue`](crate::PacketQueue).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Packet payload does not match the queue's sample format.
    #[error("packet is {actual}, queue expects {expected}")]
    FormatMismatch {
        /// Queue sample format.
        expected: SampleFormat,
        /// Packet sample format.
        actual: SampleFormat,
    },

    /// Packet payload is not a whole number of frames.
    #[error("packet holds {samples} samples, not a multiple of {channels} channels")]
    PartialFrame {
        /// Samples in the payload.
        samples: usize,
        /// Channels per frame.
        channels: u32,
    },

    /// Packet has no frames.
    #[error("packet is empty")]
    Empty,
}
