//! Buffers returned by [`ReadableStream::read_lock`](crate::ReadableStream::read_lock).

use std::fmt;

use crate::data::AudioData;
use crate::fixed::Fixed;
use crate::timeline::TimelineSnapshot;
use crate::usage::StreamUsageMask;

type ReleaseHook = Box<dyn FnOnce(bool) + Send>;

/// A window of frames owned by the consumer until dropped.
///
/// Dropping the buffer releases it to its producer. The producer's release
/// hook receives the [`fully_consumed`](Self::set_fully_consumed) flag: when
/// `false`, the consumer may need the same frames again and the producer must
/// keep them readable.
pub struct StreamBuffer {
    start: Fixed,
    frames: usize,
    channels: u32,
    data: AudioData,
    continuous: bool,
    timeline: TimelineSnapshot,
    usage_mask: StreamUsageMask,
    fully_consumed: bool,
    on_release: Option<ReleaseHook>,
}

impl StreamBuffer {
    /// Wraps `data` (interleaved, `channels` per frame) starting at `start`.
    pub fn new(start: Fixed, channels: u32, data: AudioData, timeline: TimelineSnapshot) -> Self {
        debug_assert!(channels > 0);
        debug_assert_eq!(data.len() % channels as usize, 0, "partial frame in buffer");
        Self {
            start,
            frames: data.len() / channels as usize,
            channels,
            data,
            continuous: true,
            timeline,
            usage_mask: StreamUsageMask::EMPTY,
            fully_consumed: true,
            on_release: None,
        }
    }

    /// Sets the continuity flag.
    #[must_use]
    pub fn with_continuity(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// Sets the usages that contributed to this buffer.
    #[must_use]
    pub fn with_usage_mask(mut self, mask: StreamUsageMask) -> Self {
        self.usage_mask = mask;
        self
    }

    /// Installs the hook run when the buffer is dropped.
    #[must_use]
    pub fn with_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// First frame position.
    pub fn start(&self) -> Fixed {
        self.start
    }

    /// One past the last frame position.
    pub fn end(&self) -> Fixed {
        self.start + Fixed::from_frames(self.frames as i64)
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Channels per frame.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Interleaved samples.
    pub fn data(&self) -> &AudioData {
        &self.data
    }

    /// Mutable interleaved samples.
    pub fn data_mut(&mut self) -> &mut AudioData {
        &mut self.data
    }

    /// Normalized sample at `frame`, `channel`.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data.normalized(frame * self.channels as usize + channel)
    }

    /// True when this buffer starts where the producer's previous one ended.
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Timeline valid for this buffer's frames.
    pub fn timeline(&self) -> TimelineSnapshot {
        self.timeline
    }

    /// Usages that contributed to this buffer.
    pub fn usage_mask(&self) -> StreamUsageMask {
        self.usage_mask
    }

    /// Whether every frame of this buffer has been consumed.
    pub fn is_fully_consumed(&self) -> bool {
        self.fully_consumed
    }

    /// Marks whether the consumer is done with every frame in this buffer.
    pub fn set_fully_consumed(&mut self, fully_consumed: bool) {
        self.fully_consumed = fully_consumed;
    }
}

impl Drop for StreamBuffer {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook(self.fully_consumed);
        }
    }
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("start", &self.start)
            .field("frames", &self.frames)
            .field("channels", &self.channels)
            .field("format", &self.data.sample_format())
            .field("continuous", &self.continuous)
            .field("generation", &self.timeline.generation)
            .field("fully_consumed", &self.fully_consumed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TimelineFunction;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU8, Ordering};

    fn snapshot() -> TimelineSnapshot {
        TimelineSnapshot::new(TimelineFunction::identity(), 1)
    }

    #[test]
    fn geometry() {
        let buf = StreamBuffer::new(
            Fixed::from_frames(10),
            2,
            AudioData::Float(vec![0.0; 8]),
            snapshot(),
        );
        assert_eq!(buf.frames(), 4);
        assert_eq!(buf.end(), Fixed::from_frames(14));
        assert!(buf.is_continuous());
    }

    #[test]
    fn release_hook_sees_consumption_flag() {
        // 0 = not run, 1 = run with false, 2 = run with true
        let seen = Arc::new(AtomicU8::new(0));
        let hook_seen = Arc::clone(&seen);
        let mut buf = StreamBuffer::new(Fixed::ZERO, 1, AudioData::Float(vec![0.0]), snapshot())
            .with_release(move |consumed| {
                hook_seen.store(if consumed { 2 } else { 1 }, Ordering::SeqCst);
            });
        buf.set_fully_consumed(false);
        drop(buf);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sample_is_normalized() {
        let buf = StreamBuffer::new(
            Fixed::ZERO,
            2,
            AudioData::Signed16(vec![16384, -16384]),
            snapshot(),
        );
        assert_eq!(buf.sample(0, 0), 0.5);
        assert_eq!(buf.sample(0, 1), -0.5);
    }
}
