//! Tributary Core - timing, formats and the stream contract for the mix graph
//!
//! This crate holds everything the mix graph's nodes agree on. Higher layers
//! (`tributary-mixer`, `tributary-pipeline`) build on these types; nothing in
//! here mixes audio.
//!
//! # Core Abstractions
//!
//! ## Time
//!
//! - [`Fixed`] - Frame positions with 13 fractional bits
//! - [`TimelineRate`] / [`TimelineFunction`] - Exact rational rates and affine maps
//! - [`VersionedTimelineFunction`] - Atomically published timeline snapshots
//! - [`TimelineHandle`] - A shared timeline viewed at another frame rate
//! - [`ReferenceClock`] - Time sources: [`MonotonicClock`], [`AdjustableClock`], [`ManualClock`]
//!
//! ## Streams
//!
//! - [`ReadableStream`] - Pull contract implemented by every graph node
//! - [`StreamBuffer`] - A window of frames with a release hook
//! - [`Format`] / [`SampleFormat`] / [`AudioData`] - Sample representations and codecs
//! - [`StreamUsage`] - Routing tags
//!
//! ## Leaf Streams
//!
//! - [`PacketQueue`] - Producer-fed queue with trim, flush and underflow accounting
//! - [`SignalSource`] - Synthetic waveforms
//!
//! # Features
//!
//! - `serde` - `Serialize`/`Deserialize` for [`SampleFormat`] and [`StreamUsage`]
//! - `tracing` - Debug and warning events for clock adjustments, flushes and underflows
//!
//! # Example
//!
//! ```rust
//! use tributary_core::{Fixed, Format, TimelineFunction};
//!
//! let format = Format::float(2, 48000).unwrap();
//! let timeline = TimelineFunction::new(0, 0, format.frac_frames_per_ns());
//!
//! // 10ms after the anchor is frame 480.
//! let pos = Fixed::from_raw(timeline.apply(10_000_000));
//! assert_eq!(pos, Fixed::from_frames(480));
//! ```

pub mod buffer;
pub mod clock;
pub mod data;
pub mod error;
pub mod fixed;
pub mod format;
pub mod packet_queue;
pub mod signal;
pub mod stream;
pub mod timeline;
pub mod usage;

pub use buffer::StreamBuffer;
pub use clock::{
    AdjustableClock, ClockRef, MAX_RATE_ADJUST_PPM, ManualClock, MonotonicClock, RefTime,
    ReferenceClock, monotonic_now, same_clock, translate_time,
};
pub use data::AudioData;
pub use error::{FormatError, QueueError};
pub use fixed::{FRAC_BITS, FRAC_ONE, Fixed};
pub use format::{
    Format, MAX_CHANNELS, MAX_FRAME_RATE, MIN_CHANNELS, MIN_FRAME_RATE, SampleFormat,
};
pub use packet_queue::{Packet, PacketQueue};
pub use signal::{DEFAULT_MAX_FRAMES, SignalSource, Waveform};
pub use stream::{LeadTime, ReadableStream, StreamRef, same_stream};
pub use timeline::{
    TimelineFunction, TimelineHandle, TimelineRate, TimelineSnapshot, VersionedTimelineFunction,
};
pub use usage::{ParseUsageError, StreamUsage, StreamUsageMask};
