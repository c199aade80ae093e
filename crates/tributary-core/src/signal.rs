//! Synthetic leaf streams.
//!
//! [`SignalSource`] renders a waveform on demand for any frame position. The
//! render command and the test suites use it as a stand-in for client
//! streams.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::buffer::StreamBuffer;
use crate::clock::{ClockRef, RefTime};
use crate::data::AudioData;
use crate::fixed::Fixed;
use crate::format::Format;
use crate::stream::{LeadTime, ReadableStream};
use crate::timeline::{TimelineFunction, TimelineSnapshot, VersionedTimelineFunction};

/// Default largest buffer returned by one read.
pub const DEFAULT_MAX_FRAMES: usize = 1024;

/// Waveform produced by a [`SignalSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// No data at all: every read returns `None`.
    Silence,
    /// A DC level on every channel.
    Constant(f32),
    /// A sine wave on every channel, phase zero at frame zero.
    Sine {
        /// Frequency in Hz.
        frequency: f32,
        /// Peak amplitude.
        amplitude: f32,
    },
}

impl Waveform {
    fn value_at(self, frame: i64, frames_per_second: u32) -> f64 {
        match self {
            Waveform::Silence => 0.0,
            Waveform::Constant(v) => f64::from(v),
            Waveform::Sine {
                frequency,
                amplitude,
            } => {
                let t = frame as f64 / f64::from(frames_per_second);
                f64::from(amplitude) * libm::sin(TAU * f64::from(frequency) * t)
            }
        }
    }
}

/// A stream that synthesizes its frames.
pub struct SignalSource {
    name: String,
    format: Format,
    waveform: Waveform,
    timeline: Arc<VersionedTimelineFunction>,
    clock: ClockRef,
    max_frames: usize,
    lead: LeadTime,
    last_trim: AtomicI64,
}

impl SignalSource {
    /// Creates a source whose frame 0 is at reference time zero.
    pub fn new(format: Format, waveform: Waveform, clock: ClockRef) -> Self {
        let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
            0,
            0,
            format.frac_frames_per_ns(),
        )));
        Self::with_timeline(format, waveform, clock, timeline)
    }

    /// Creates a source with an explicit reference-time-to-frame timeline.
    pub fn with_timeline(
        format: Format,
        waveform: Waveform,
        clock: ClockRef,
        timeline: Arc<VersionedTimelineFunction>,
    ) -> Self {
        Self {
            name: "signal".to_string(),
            format,
            waveform,
            timeline,
            clock,
            max_frames: DEFAULT_MAX_FRAMES,
            lead: LeadTime::new(),
            last_trim: AtomicI64::new(i64::MIN),
        }
    }

    /// Sets the label used in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Caps the frames returned by one read.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self
    }

    /// The shared timeline.
    pub fn timeline(&self) -> &Arc<VersionedTimelineFunction> {
        &self.timeline
    }

    /// Latest trim time, if any.
    pub fn last_trim(&self) -> Option<RefTime> {
        match self.last_trim.load(Ordering::Acquire) {
            i64::MIN => None,
            t => Some(RefTime::from_nanos(t)),
        }
    }
}

impl ReadableStream for SignalSource {
    fn format(&self) -> &Format {
        &self.format
    }

    fn read_lock(&self, _ref_time: RefTime, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        debug_assert!(frame_count > 0, "zero-length read");
        if frame_count == 0 || self.waveform == Waveform::Silence {
            return None;
        }
        let frames = frame_count.min(self.max_frames);
        let channels = self.format.channels() as usize;
        let rate = self.format.frames_per_second();
        let waveform = self.waveform;
        let values = (0..frames).flat_map(|i| {
            let v = waveform.value_at(frame + i as i64, rate);
            std::iter::repeat_n(v, channels)
        });
        let data = AudioData::from_normalized(self.format.sample_format(), values);
        Some(StreamBuffer::new(
            Fixed::from_frames(frame),
            self.format.channels(),
            data,
            self.timeline.get(),
        ))
    }

    fn trim(&self, ref_time: RefTime) {
        self.last_trim.fetch_max(ref_time.as_nanos(), Ordering::AcqRel);
    }

    fn ref_time_to_frac_frame(&self) -> TimelineSnapshot {
        self.timeline.get()
    }

    fn reference_clock(&self) -> ClockRef {
        Arc::clone(&self.clock)
    }

    fn set_min_lead_time(&self, lead: Duration) {
        self.lead.set(lead);
    }

    fn min_lead_time(&self) -> Duration {
        self.lead.get()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
