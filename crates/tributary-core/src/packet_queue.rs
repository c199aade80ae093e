//! Client packet queue.
//!
//! A [`PacketQueue`] is the leaf stream a producer writes into. Packets are
//! positioned on the stream's own fractional-frame timeline and released back
//! to the producer once the mixer no longer needs them: when a read buffer
//! covering them is dropped fully consumed, when the queue is trimmed past
//! them, or when the queue is flushed.
//!
//! A packet that is already entirely in the past the first time a read
//! reaches it was never heard. It is dropped and counted as an underflow.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::buffer::StreamBuffer;
use crate::clock::{ClockRef, RefTime};
use crate::data::AudioData;
use crate::error::QueueError;
use crate::fixed::{FRAC_BITS, FRAC_ONE, Fixed};
use crate::format::Format;
use crate::stream::{LeadTime, ReadableStream};
use crate::timeline::{TimelineSnapshot, VersionedTimelineFunction};

type PacketCallback = Box<dyn FnOnce() + Send>;

/// A run of frames handed to a [`PacketQueue`].
pub struct Packet {
    start: Fixed,
    data: AudioData,
    on_release: Option<PacketCallback>,
}

impl Packet {
    /// A packet whose first frame sits at `start`.
    pub fn new(start: Fixed, data: AudioData) -> Self {
        Self {
            start,
            data,
            on_release: None,
        }
    }

    /// Runs `callback` when the queue releases the packet.
    #[must_use]
    pub fn with_release<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_release = Some(Box::new(callback));
        self
    }

    /// First frame position.
    pub fn start(&self) -> Fixed {
        self.start
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("start", &self.start)
            .field("samples", &self.data.len())
            .finish_non_exhaustive()
    }
}

struct QueuedPacket {
    packet: Packet,
    frames: usize,
    seen: bool,
}

impl QueuedPacket {
    fn end(&self) -> Fixed {
        self.packet.start + Fixed::from_frames(self.frames as i64)
    }

    fn release(mut self) {
        if let Some(callback) = self.packet.on_release.take() {
            callback();
        }
    }
}

#[derive(Default)]
struct QueueState {
    packets: VecDeque<QueuedPacket>,
    last_read_end: Option<Fixed>,
}

impl QueueState {
    fn take_through(&mut self, frame: Fixed) -> Vec<QueuedPacket> {
        let mut done = Vec::new();
        while self.packets.front().is_some_and(|p| p.end() <= frame) {
            done.extend(self.packets.pop_front());
        }
        done
    }
}

fn release_all(packets: Vec<QueuedPacket>) {
    for p in packets {
        p.release();
    }
}

/// Whole frames needed to advance from `from` to at least `to`.
fn frames_until(from: Fixed, to: Fixed) -> i64 {
    (to - from).raw().max(0).saturating_add(FRAC_ONE - 1) >> FRAC_BITS
}

/// A producer-fed leaf stream.
pub struct PacketQueue {
    name: String,
    format: Format,
    timeline: Arc<VersionedTimelineFunction>,
    clock: ClockRef,
    state: Arc<Mutex<QueueState>>,
    lead: LeadTime,
    underflows: AtomicU64,
    last_trim: AtomicI64,
}

impl PacketQueue {
    /// Creates an empty queue.
    pub fn new(
        format: Format,
        timeline: Arc<VersionedTimelineFunction>,
        clock: ClockRef,
    ) -> Self {
        Self {
            name: "packet-queue".to_string(),
            format,
            timeline,
            clock,
            state: Arc::new(Mutex::new(QueueState::default())),
            lead: LeadTime::new(),
            underflows: AtomicU64::new(0),
            last_trim: AtomicI64::new(i64::MIN),
        }
    }

    /// Sets the label used in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a packet.
    pub fn push(&self, packet: Packet) -> Result<(), QueueError> {
        let expected = self.format.sample_format();
        let actual = packet.data.sample_format();
        if expected != actual {
            return Err(QueueError::FormatMismatch { expected, actual });
        }
        let channels = self.format.channels();
        let samples = packet.data.len();
        if samples == 0 {
            return Err(QueueError::Empty);
        }
        if samples % channels as usize != 0 {
            return Err(QueueError::PartialFrame { samples, channels });
        }
        let frames = samples / channels as usize;
        self.state.lock().packets.push_back(QueuedPacket {
            packet,
            frames,
            seen: false,
        });
        Ok(())
    }

    /// Releases every queued packet.
    pub fn flush(&self) {
        let released: Vec<QueuedPacket> = {
            let mut state = self.state.lock();
            state.last_read_end = None;
            state.packets.drain(..).collect()
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(queue = %self.name, packets = released.len(), "queue_flush");
        release_all(released);
    }

    /// Packets waiting to be played or released.
    pub fn len(&self) -> usize {
        self.state.lock().packets.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packets dropped because they arrived too late to be heard.
    pub fn underflow_count(&self) -> u64 {
        self.underflows.load(Ordering::Relaxed)
    }

    /// The shared timeline.
    pub fn timeline(&self) -> &Arc<VersionedTimelineFunction> {
        &self.timeline
    }
}

impl ReadableStream for PacketQueue {
    fn format(&self) -> &Format {
        &self.format
    }

    fn read_lock(&self, _ref_time: RefTime, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        debug_assert!(frame_count > 0, "zero-length read");
        if frame_count == 0 {
            return None;
        }
        let window_start = Fixed::from_frames(frame);
        let window_end = Fixed::from_frames(frame.saturating_add(frame_count as i64));
        let channels = self.format.channels() as usize;

        let mut late = Vec::new();
        let buffer = {
            let mut state = self.state.lock();
            // Drop packets with no whole frame left inside the window.
            while let Some(front) = state.packets.front() {
                let skip = frames_until(front.packet.start, window_start);
                if skip < front.frames as i64 {
                    break;
                }
                late.extend(state.packets.pop_front());
            }

            match state.packets.front_mut() {
                Some(front) if front.packet.start < window_end => {
                    let skip = frames_until(front.packet.start, window_start) as usize;
                    let start = front.packet.start + Fixed::from_frames(skip as i64);
                    let wanted = frames_until(start, window_end) as usize;
                    let take = (front.frames - skip).min(wanted);
                    front.seen = true;
                    let data = front.packet.data.slice(skip * channels, (skip + take) * channels);
                    let end = start + Fixed::from_frames(take as i64);

                    let continuous = state.last_read_end.is_none_or(|prev| prev == start);
                    state.last_read_end = Some(end);

                    let release_state = Arc::clone(&self.state);
                    Some(
                        StreamBuffer::new(start, self.format.channels(), data, self.timeline.get())
                            .with_continuity(continuous)
                            .with_release(move |fully_consumed| {
                                if fully_consumed {
                                    let done = release_state.lock().take_through(end);
                                    release_all(done);
                                }
                            }),
                    )
                }
                _ => None,
            }
        };

        let unheard = late.iter().filter(|p| !p.seen).count() as u64;
        if unheard > 0 {
            self.underflows.fetch_add(unheard, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::warn!(queue = %self.name, frame, packets = unheard, "packet_underflow");
        }
        release_all(late);
        buffer
    }

    fn trim(&self, ref_time: RefTime) {
        let previous = self.last_trim.fetch_max(ref_time.as_nanos(), Ordering::AcqRel);
        if ref_time.as_nanos() <= previous {
            return;
        }
        let snapshot = self.timeline.get();
        let frame = Fixed::from_raw(snapshot.function.apply(ref_time.as_nanos()));
        let done = self.state.lock().take_through(frame);
        release_all(done);
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
