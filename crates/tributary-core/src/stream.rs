//! The readable stream contract shared by every node of the mix graph.
//!
//! Leaves (client packet queues, synthetic sources) and interior nodes (mix
//! and effects stages) all implement [`ReadableStream`]. Consumers pull: they
//! ask for a window of frames at a reference time and get back at most one
//! contiguous [`StreamBuffer`], or `None` when the window holds no data.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tributary_core::{
//!     Format, ManualClock, RefTime, ReadableStream, SignalSource, StreamRef, Waveform,
//! };
//!
//! let clock = Arc::new(ManualClock::new(RefTime::ZERO));
//! let format = Format::float(1, 48000).unwrap();
//! let source: StreamRef = Arc::new(SignalSource::new(format, Waveform::Constant(0.25), clock));
//!
//! let buf = source.read_lock(RefTime::ZERO, 0, 64).expect("constant source has data");
//! assert_eq!(buf.frames(), 64);
//! assert_eq!(buf.sample(0, 0), 0.25);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::buffer::StreamBuffer;
use crate::clock::{ClockRef, RefTime};
use crate::format::Format;
use crate::timeline::TimelineSnapshot;

/// A pull-based source of audio frames.
///
/// Implementations use interior mutability and are shared through
/// [`StreamRef`]. All methods may be called from the mixing thread while
/// control threads call others; none of them may block on I/O.
pub trait ReadableStream: Send + Sync {
    /// Format of the frames this stream produces.
    fn format(&self) -> &Format;

    /// Returns the first contiguous run of available frames inside
    /// `[frame, frame + frame_count)`, or `None` if the window holds no data.
    ///
    /// `frame` is in this stream's own frame domain and `ref_time` is the
    /// reference time at which the consumer needs it. The returned buffer may
    /// be shorter than requested; callers ask again for the remainder.
    fn read_lock(&self, ref_time: RefTime, frame: i64, frame_count: usize)
    -> Option<StreamBuffer>;

    /// Discards data at or before `ref_time`. Repeating a trim, or trimming
    /// to an earlier time, has no effect.
    fn trim(&self, ref_time: RefTime);

    /// Current mapping from reference time to fractional frames.
    fn ref_time_to_frac_frame(&self) -> TimelineSnapshot;

    /// The clock `ref_time` values are measured on.
    fn reference_clock(&self) -> ClockRef;

    /// How far ahead of playback the consumer will ask for data.
    fn set_min_lead_time(&self, lead: Duration);

    /// The most recently advertised lead time.
    fn min_lead_time(&self) -> Duration;

    /// Short label for logs.
    fn name(&self) -> &str {
        "stream"
    }
}

/// Shared handle to a readable stream.
pub type StreamRef = Arc<dyn ReadableStream>;

/// True if both handles point at the same stream instance.
pub fn same_stream(a: &StreamRef, b: &StreamRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Atomically stored lead time.
#[derive(Debug, Default)]
pub struct LeadTime(AtomicU64);

impl LeadTime {
    /// Starts at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Current value.
    pub fn get(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Acquire))
    }

    /// Stores `lead` and returns the previous value.
    pub fn set(&self, lead: Duration) -> Duration {
        let nanos = u64::try_from(lead.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(self.0.swap(nanos, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::signal::{SignalSource, Waveform};

    #[test]
    fn same_stream_compares_identity() {
        let clock = Arc::new(ManualClock::new(RefTime::ZERO));
        let format = Format::float(1, 48000).unwrap();
        let a: StreamRef = Arc::new(SignalSource::new(format, Waveform::Silence, clock.clone()));
        let b: StreamRef = Arc::new(SignalSource::new(format, Waveform::Silence, clock));
        assert!(same_stream(&a, &Arc::clone(&a)));
        assert!(!same_stream(&a, &b));
    }

    #[test]
    fn lead_time_swaps() {
        let lead = LeadTime::new();
        assert_eq!(lead.set(Duration::from_millis(5)), Duration::ZERO);
        assert_eq!(lead.get(), Duration::from_millis(5));
    }
}
