//! The per-input mixer.
//!
//! A [`Mixer`] owns everything needed to add one source stream into a mix
//! group's accumulator: the sampler, channel mapping, gain ramp and a scratch
//! window of source frames. One mix job runs as follows:
//!
//! 1. Compose `source timeline ∘ source clock⁻¹ ∘ dest clock ∘ dest timeline⁻¹`
//!    into one affine map from destination frames to source frames.
//! 2. Evaluate it at the first and one-past-last destination frame, and step
//!    linearly between the two with exact integer interpolation.
//! 3. Read the source frames the sampler needs, zero-filling whatever the
//!    source cannot supply.
//! 4. Sample, apply gain, and add into the `f64` accumulator.

use tributary_core::{
    AudioData, ClockRef, Fixed, Format, ReadableStream, RefTime, SampleFormat, StreamUsageMask,
    TimelineFunction, TimelineSnapshot, same_clock,
};

use crate::channel::ChannelMap;
use crate::gain::{Gain, GainUpdate};
use crate::policy::ResamplerPolicy;
use crate::sampler::Sampler;

/// Attempts per job when a source's timeline changes mid-read.
const MAX_TIMELINE_RETRIES: usize = 2;

/// One destination window to mix.
#[derive(Debug, Clone)]
pub struct MixJob<'a> {
    /// Reference time of the first destination frame.
    pub ref_time: RefTime,
    /// First destination frame.
    pub dest_frame: i64,
    /// Number of destination frames.
    pub frame_count: usize,
    /// Destination reference time to fractional frame mapping.
    pub dest_timeline: TimelineFunction,
    /// Clock the destination timeline is measured on.
    pub dest_clock: &'a ClockRef,
}

/// What one input contributed to a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixOutcome {
    /// Destination frames rendered from real source data.
    pub frames_mixed: usize,
    /// True when the input was skipped (muted, paused, or no data).
    pub silent: bool,
    /// Usage masks carried by the source buffers that were read.
    pub usages: StreamUsageMask,
    /// Source frames the job needed but the source could not supply.
    pub gap_frames: u64,
    /// Times the job restarted because the source timeline changed mid-read.
    pub timeline_retries: u64,
}

impl MixOutcome {
    const SILENT: MixOutcome = MixOutcome {
        frames_mixed: 0,
        silent: true,
        usages: StreamUsageMask::EMPTY,
        gap_frames: 0,
        timeline_retries: 0,
    };
}

/// Running totals for one mixer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerStats {
    /// Jobs run.
    pub jobs: u64,
    /// Jobs that contributed nothing.
    pub silent_jobs: u64,
    /// Source frames that were needed but unavailable and zero-filled.
    pub gap_frames: u64,
    /// Jobs retried after a timeline update raced the read.
    pub timeline_retries: u64,
}

enum Fetch {
    Filled(usize),
    Raced,
}

/// Converts and accumulates one input into a destination format.
#[derive(Debug)]
pub struct Mixer {
    source_format: Format,
    dest_format: Format,
    sampler: Sampler,
    channel_map: ChannelMap,
    gain: Gain,
    window: Vec<f32>,
    source_frame: Vec<f32>,
    out_frame: Vec<f32>,
    window_usages: StreamUsageMask,
    stats: MixerStats,
}

impl Mixer {
    /// Creates a mixer from `source_format` into `dest_format`.
    pub fn new(source_format: Format, dest_format: Format, policy: ResamplerPolicy) -> Self {
        let sampler = Sampler::new(
            policy,
            source_format.frames_per_second(),
            dest_format.frames_per_second(),
        );
        let channel_map = ChannelMap::new(
            source_format.channels() as usize,
            dest_format.channels() as usize,
        );
        #[cfg(feature = "tracing")]
        tracing::debug!(
            source = %source_format,
            dest = %dest_format,
            sampler = %sampler.policy(),
            "mixer_create"
        );
        Self {
            source_format,
            dest_format,
            sampler,
            channel_map,
            gain: Gain::new(),
            window: Vec::new(),
            source_frame: vec![0.0; source_format.channels() as usize],
            out_frame: vec![0.0; dest_format.channels() as usize],
            window_usages: StreamUsageMask::EMPTY,
            stats: MixerStats::default(),
        }
    }

    /// Source format.
    pub fn source_format(&self) -> &Format {
        &self.source_format
    }

    /// Destination format.
    pub fn dest_format(&self) -> &Format {
        &self.dest_format
    }

    /// The sampler in use.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Gain state.
    pub fn gain(&self) -> &Gain {
        &self.gain
    }

    /// Mutable gain state.
    pub fn gain_mut(&mut self) -> &mut Gain {
        &mut self.gain
    }

    /// Running totals.
    pub fn stats(&self) -> MixerStats {
        self.stats
    }

    /// Applies a control-thread gain change.
    pub fn apply_gain_update(&mut self, update: GainUpdate) {
        match update {
            GainUpdate::Source(db) => self.gain.set_source_gain(db),
            GainUpdate::Dest(db) => self.gain.set_dest_gain(db),
            GainUpdate::Ramp { db, duration } => {
                let frames = self.dest_format.frames_for(duration).max(0) as u64;
                self.gain.set_source_gain_with_ramp(db, frames);
            }
            GainUpdate::Mute(muted) => self.gain.set_mute(muted),
        }
    }

    /// Maps destination fractional frames to source fractional frames, or
    /// `None` if either side is paused.
    fn dest_to_source(
        source: &dyn ReadableStream,
        snapshot: &TimelineSnapshot,
        job: &MixJob<'_>,
    ) -> Option<TimelineFunction> {
        if !job.dest_timeline.is_invertible() || !snapshot.function.is_invertible() {
            return None;
        }
        let dest_frac_to_ref = job.dest_timeline.inverse();
        let source_clock = source.reference_clock();
        let dest_to_source_ref = if same_clock(job.dest_clock, &source_clock) {
            dest_frac_to_ref
        } else {
            let source_to_mono = source_clock.to_monotonic();
            if !source_to_mono.is_invertible() {
                return None;
            }
            let dest_to_mono =
                TimelineFunction::compose(&job.dest_clock.to_monotonic(), &dest_frac_to_ref);
            TimelineFunction::compose(&source_to_mono.inverse(), &dest_to_mono)
        };
        Some(TimelineFunction::compose(&snapshot.function, &dest_to_source_ref))
    }

    /// Mixes `source` into `accum` (interleaved, destination channels,
    /// `job.frame_count` frames).
    pub fn mix(
        &mut self,
        source: &dyn ReadableStream,
        job: &MixJob<'_>,
        accum: &mut [f64],
    ) -> MixOutcome {
        debug_assert_eq!(
            accum.len(),
            job.frame_count * self.dest_format.channels() as usize
        );
        self.stats.jobs += 1;
        if job.frame_count == 0 {
            return MixOutcome::SILENT;
        }
        if self.gain.is_silent() {
            self.gain.advance(job.frame_count as u64);
            self.stats.silent_jobs += 1;
            return MixOutcome::SILENT;
        }

        let mut retries = 0u64;
        let mut gaps = 0u64;
        for _ in 0..MAX_TIMELINE_RETRIES {
            let snapshot = source.ref_time_to_frac_frame();
            let Some(map) = Self::dest_to_source(source, &snapshot, job) else {
                break;
            };

            let count = job.frame_count as i64;
            let s0 = Fixed::from_raw(map.apply(Fixed::from_frames(job.dest_frame).raw()));
            let s1 = Fixed::from_raw(map.apply(Fixed::from_frames(job.dest_frame + count).raw()));
            let step = i128::from((s1 - s0).raw());
            let position = |i: i64| {
                let offset = step * i128::from(i) / i128::from(count);
                s0 + Fixed::from_raw(offset as i64)
            };

            let (first, last) = self.sampler.span(s0, position(count - 1));
            let (next_first, _) = self.sampler.span(s1, s1);
            let needed = (last - first + 1).max(0) as u64;

            match self.fetch(source, &snapshot, first, last, next_first) {
                Fetch::Raced => {
                    retries += 1;
                    continue;
                }
                Fetch::Filled(0) => {
                    gaps = needed;
                    break;
                }
                Fetch::Filled(filled) => {
                    let channels = self.dest_format.channels() as usize;
                    let origin = Fixed::from_frames(first);
                    for i in 0..job.frame_count {
                        let rel = position(i as i64) - origin;
                        self.sampler
                            .sample(&self.window, channels, rel, &mut self.out_frame);
                        let scale = self.gain.next_scale();
                        let dest = &mut accum[i * channels..(i + 1) * channels];
                        for (acc, &s) in dest.iter_mut().zip(&self.out_frame) {
                            *acc += f64::from(s) * scale;
                        }
                    }
                    let gap_frames = needed - filled as u64;
                    self.record_misses(source, job, gap_frames, retries);
                    return MixOutcome {
                        frames_mixed: job.frame_count,
                        silent: false,
                        usages: self.window_usages,
                        gap_frames,
                        timeline_retries: retries,
                    };
                }
            }
        }

        self.gain.advance(job.frame_count as u64);
        self.stats.silent_jobs += 1;
        self.record_misses(source, job, gaps, retries);
        MixOutcome {
            gap_frames: gaps,
            timeline_retries: retries,
            ..MixOutcome::SILENT
        }
    }

    fn record_misses(
        &mut self,
        source: &dyn ReadableStream,
        job: &MixJob<'_>,
        gap_frames: u64,
        retries: u64,
    ) {
        self.stats.gap_frames += gap_frames;
        self.stats.timeline_retries += retries;
        #[cfg(feature = "tracing")]
        if gap_frames > 0 {
            tracing::warn!(
                source = source.name(),
                dest_frame = job.dest_frame,
                gap_frames,
                "source frames missing, zero-filled"
            );
        }
        #[cfg(not(feature = "tracing"))]
        let _ = (source, job);
    }

    /// Reads source frames `first..=last` into the window (destination
    /// channels), zero-filling gaps. Returns how many frames held data.
    fn fetch(
        &mut self,
        source: &dyn ReadableStream,
        snapshot: &TimelineSnapshot,
        first: i64,
        last: i64,
        next_first: i64,
    ) -> Fetch {
        let dest_channels = self.channel_map.dest_channels();
        let source_channels = self.channel_map.source_channels();
        let frames = (last - first + 1).max(0) as usize;
        self.window.clear();
        self.window.resize(frames * dest_channels, 0.0);
        self.window_usages = StreamUsageMask::EMPTY;

        let mut filled = 0usize;
        let mut cursor = first;
        while cursor <= last {
            let ref_time = RefTime::from_nanos(
                snapshot
                    .function
                    .apply_inverse(Fixed::from_frames(cursor).raw()),
            );
            let Some(mut buffer) = source.read_lock(ref_time, cursor, (last + 1 - cursor) as usize)
            else {
                break;
            };
            if buffer.timeline().generation != snapshot.generation {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    source = source.name(),
                    expected = snapshot.generation,
                    actual = buffer.timeline().generation,
                    "timeline changed during read, retrying"
                );
                buffer.set_fully_consumed(false);
                return Fetch::Raced;
            }

            self.window_usages = self.window_usages.union(buffer.usage_mask());

            // Source frames sit on the integral grid nearest their position.
            let buffer_first = buffer.start().round();
            let buffer_end = buffer_first + buffer.frames() as i64;
            let copy_from = buffer_first.max(cursor);
            let copy_to = buffer_end.min(last + 1);
            for frame in copy_from..copy_to {
                let j = (frame - buffer_first) as usize;
                for c in 0..source_channels {
                    self.source_frame[c] = buffer.sample(j, c);
                }
                let w = (frame - first) as usize * dest_channels;
                self.channel_map
                    .map_frame(&self.source_frame, &mut self.window[w..w + dest_channels]);
            }
            filled += (copy_to - copy_from).max(0) as usize;

            buffer.set_fully_consumed(buffer_end <= next_first);
            drop(buffer);

            if buffer_end <= cursor {
                break;
            }
            cursor = buffer_end;
        }
        Fetch::Filled(filled)
    }
}

/// Encodes an accumulator into `format`, saturating out-of-range values.
pub fn finalize(accum: &[f64], format: SampleFormat) -> AudioData {
    AudioData::from_normalized(format, accum.iter().copied())
}
