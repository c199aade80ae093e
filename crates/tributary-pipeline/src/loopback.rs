//! Loopback capture.
//!
//! A [`LoopbackCapture`] sits in the main path directly above the tapped
//! node. Every block the main path pulls through it is copied into a bounded
//! ring, and the [`LoopbackTap`] handed to the capture client serves frames
//! from that ring only. Loopback reads never pull the graph, so a lagging or
//! early client sees silence by absence instead of re-running the mix.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use tributary_core::{
    AudioData, ClockRef, Fixed, Format, LeadTime, ReadableStream, RefTime, StreamBuffer,
    StreamRef, StreamUsageMask, TimelineSnapshot,
};

/// Blocks of history the capture ring keeps for a lagging client.
pub const LOOPBACK_CAPACITY_BLOCKS: usize = 16;

struct CapturedBlock {
    start: i64,
    frames: usize,
    timeline: TimelineSnapshot,
    usage_mask: StreamUsageMask,
    data: AudioData,
}

impl CapturedBlock {
    fn end(&self) -> i64 {
        self.start + self.frames as i64
    }
}

struct CaptureRing {
    channels: usize,
    capacity: usize,
    frames: usize,
    blocks: VecDeque<CapturedBlock>,
}

impl CaptureRing {
    fn new(channels: usize, capacity: usize) -> Self {
        Self {
            channels,
            capacity: capacity.max(1),
            frames: 0,
            blocks: VecDeque::new(),
        }
    }

    fn available(&self) -> Option<Range<i64>> {
        let first = self.blocks.front()?;
        let last = self.blocks.back()?;
        Some(first.start..last.end())
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.frames = 0;
    }

    /// Appends the part of `buffer` past the newest captured frame. Frames
    /// already held (re-reads served from a stage cache) are not copied again.
    fn push(&mut self, buffer: &StreamBuffer) {
        let frames = buffer.frames();
        if frames == 0 {
            return;
        }
        let start = buffer.start().round();
        let end = start + frames as i64;
        let timeline = buffer.timeline();

        if self
            .blocks
            .back()
            .is_some_and(|b| b.timeline.generation != timeline.generation)
        {
            self.clear();
        }

        let mut skip = 0usize;
        if let Some(held) = self.available() {
            if start > held.end {
                // The main path jumped ahead; what is held no longer joins up.
                self.clear();
            } else if end <= held.end {
                return;
            } else {
                skip = (held.end - start) as usize;
            }
        }

        let data = if skip == 0 {
            buffer.data().clone()
        } else {
            buffer
                .data()
                .slice(skip * self.channels, frames * self.channels)
        };
        self.blocks.push_back(CapturedBlock {
            start: start + skip as i64,
            frames: frames - skip,
            timeline,
            usage_mask: buffer.usage_mask(),
            data,
        });
        self.frames += frames - skip;

        while self.frames > self.capacity && self.blocks.len() > 1 {
            if let Some(old) = self.blocks.pop_front() {
                self.frames -= old.frames;
            }
        }
    }

    fn read(&self, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        let block = self
            .blocks
            .iter()
            .find(|b| frame >= b.start && frame < b.end())?;
        let offset = (frame - block.start) as usize;
        let frames = frame_count.min(block.frames - offset);
        let data = block
            .data
            .slice(offset * self.channels, (offset + frames) * self.channels);
        Some(
            StreamBuffer::new(
                Fixed::from_frames(frame),
                self.channels as u32,
                data,
                block.timeline,
            )
            .with_usage_mask(block.usage_mask),
        )
    }
}

/// Main-path pass-through that records what the tapped node produced.
///
/// Everything is delegated to the tapped node; reads are additionally copied
/// into the capture ring shared with [`LoopbackTap`].
pub struct LoopbackCapture {
    node: StreamRef,
    ring: Arc<Mutex<CaptureRing>>,
}

impl LoopbackCapture {
    /// Wraps `node`, keeping up to `capacity_frames` frames of history.
    pub fn new(node: StreamRef, capacity_frames: usize) -> Self {
        let channels = node.format().channels() as usize;
        Self {
            node,
            ring: Arc::new(Mutex::new(CaptureRing::new(channels, capacity_frames))),
        }
    }

    /// The consumer side of this capture.
    pub fn tap(&self) -> LoopbackTap {
        LoopbackTap {
            name: format!("{}.loopback", self.node.name()),
            node: Arc::clone(&self.node),
            ring: Arc::clone(&self.ring),
            lead: LeadTime::new(),
            last_trim: AtomicI64::new(i64::MIN),
        }
    }
}

impl ReadableStream for LoopbackCapture {
    fn format(&self) -> &Format {
        self.node.format()
    }

    fn read_lock(&self, ref_time: RefTime, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        let buffer = self.node.read_lock(ref_time, frame, frame_count)?;
        self.ring.lock().push(&buffer);
        Some(buffer)
    }

    fn trim(&self, ref_time: RefTime) {
        self.node.trim(ref_time);
    }

    fn ref_time_to_frac_frame(&self) -> TimelineSnapshot {
        self.node.ref_time_to_frac_frame()
    }

    fn reference_clock(&self) -> ClockRef {
        self.node.reference_clock()
    }

    fn set_min_lead_time(&self, lead: Duration) {
        self.node.set_min_lead_time(lead);
    }

    fn min_lead_time(&self) -> Duration {
        self.node.min_lead_time()
    }

    fn name(&self) -> &str {
        self.node.name()
    }
}

/// A read-only view of one node of the mix graph.
///
/// Reads are served from frames the main path has already produced; a
/// window the main path has not reached yet, or has rotated out of the ring,
/// reads as `None`. Only the tapped node's format, clock and timeline are
/// consulted. Lead time and trim requests stop here.
pub struct LoopbackTap {
    name: String,
    node: StreamRef,
    ring: Arc<Mutex<CaptureRing>>,
    lead: LeadTime,
    last_trim: AtomicI64,
}

impl LoopbackTap {
    /// Frames currently held, in the tapped node's frame domain.
    pub fn available(&self) -> Option<Range<i64>> {
        self.ring.lock().available()
    }

    /// Latest trim requested by the loopback consumer.
    pub fn last_trim(&self) -> Option<RefTime> {
        match self.last_trim.load(Ordering::Acquire) {
            i64::MIN => None,
            t => Some(RefTime::from_nanos(t)),
        }
    }
}

impl ReadableStream for LoopbackTap {
    fn format(&self) -> &Format {
        self.node.format()
    }

    fn read_lock(&self, _ref_time: RefTime, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        debug_assert!(frame_count > 0, "zero-length read");
        if frame_count == 0 {
            return None;
        }
        self.ring.lock().read(frame, frame_count)
    }

    fn trim(&self, ref_time: RefTime) {
        self.last_trim
            .fetch_max(ref_time.as_nanos(), Ordering::AcqRel);
    }

    fn ref_time_to_frac_frame(&self) -> TimelineSnapshot {
        self.node.ref_time_to_frac_frame()
    }

    fn reference_clock(&self) -> ClockRef {
        self.node.reference_clock()
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
