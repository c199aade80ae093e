//! N-to-1 mix stage.
//!
//! A [`MixStage`] owns one [`Mixer`] per attached input and sums every input
//! into its own format. The input list is an atomically swapped snapshot:
//! the pull path loads it once per block, and attach/detach publish a new
//! list under a short mutation lock, so control threads never wait for an
//! in-flight pull to finish. Gain changes travel the same way: they are
//! queued on a channel and drained by the mix thread at the start of the
//! input's next job.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use tributary_core::{
    AudioData, ClockRef, Fixed, Format, LeadTime, ReadableStream, RefTime, StreamBuffer,
    StreamRef, StreamUsage, StreamUsageMask, TimelineHandle, TimelineSnapshot, same_stream,
    translate_time,
};
use tributary_mixer::{GainUpdate, MixJob, Mixer, ResamplerPolicy, finalize};

use crate::error::PipelineError;

/// Identifies one attachment of a stream to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputHandle {
    stage: Arc<str>,
    id: u64,
}

impl InputHandle {
    /// Name of the stage the input is attached to.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Attachment id, unique within the stage.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Running totals for one mix stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixStats {
    /// Blocks mixed (cache hits are not counted).
    pub mix_jobs: u64,
    /// Input frames that contributed nothing (muted, paused or starved).
    pub silent_input_frames: u64,
    /// Usages that contributed to the most recent block.
    pub usages_mixed: StreamUsageMask,
    /// Source frames inputs needed but could not supply in time.
    pub gap_frames: u64,
    /// Input jobs restarted because a source timeline changed mid-read.
    pub timeline_retries: u64,
}

struct InputSlot {
    id: u64,
    stream: StreamRef,
    usage: Option<StreamUsage>,
    /// Only the mix thread locks this, for the length of one job.
    mixer: Mutex<Mixer>,
    gain_tx: Sender<GainUpdate>,
    gain_rx: Receiver<GainUpdate>,
    /// Extra lead the sampler needs past the last destination frame.
    lead_pad: Duration,
    /// History the sampler needs before the first destination frame.
    trim_pad: Duration,
}

/// The last mixed block, kept so re-reads of the same frames are identical.
struct CachedBlock {
    start: i64,
    frames: usize,
    generation: u64,
    topology: u64,
    usage_mask: StreamUsageMask,
    data: AudioData,
}

impl CachedBlock {
    fn covers(&self, frame: i64, generation: u64, topology: u64) -> bool {
        self.generation == generation
            && self.topology == topology
            && frame >= self.start
            && frame < self.start + self.frames as i64
    }
}

/// Sums any number of inputs into one stream of a fixed format.
pub struct MixStage {
    name: Arc<str>,
    format: Format,
    block_size: usize,
    timeline: TimelineHandle,
    clock: ClockRef,
    default_resampler: ResamplerPolicy,
    inputs: ArcSwap<Vec<Arc<InputSlot>>>,
    mutation: Mutex<()>,
    next_id: AtomicU64,
    /// Bumped on attach, detach and gain changes.
    topology: AtomicU64,
    cache: Mutex<Option<CachedBlock>>,
    stats: Mutex<MixStats>,
    lead: LeadTime,
    last_trim: AtomicI64,
}

impl MixStage {
    /// Creates an empty stage.
    ///
    /// `timeline` maps reference time to this stage's fractional frames and
    /// `block_size` caps the frames produced per read.
    pub fn new(
        name: impl Into<String>,
        format: Format,
        block_size: usize,
        timeline: TimelineHandle,
        clock: ClockRef,
        default_resampler: ResamplerPolicy,
    ) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            format,
            block_size: block_size.max(1),
            timeline,
            clock,
            default_resampler,
            inputs: ArcSwap::from_pointee(Vec::new()),
            mutation: Mutex::new(()),
            next_id: AtomicU64::new(1),
            topology: AtomicU64::new(0),
            cache: Mutex::new(None),
            stats: Mutex::new(MixStats::default()),
            lead: LeadTime::new(),
            last_trim: AtomicI64::new(i64::MIN),
        }
    }

    /// Largest block produced per read.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Attaches `stream`. Internal links between stages pass `None` for the
    /// usage. `hint` picks the resampler; `Default` defers to the stage.
    pub fn add_input(
        &self,
        stream: StreamRef,
        usage: Option<StreamUsage>,
        hint: ResamplerPolicy,
    ) -> Result<InputHandle, PipelineError> {
        let _guard = self.mutation.lock();
        let current = self.inputs.load();
        if current.iter().any(|slot| same_stream(&slot.stream, &stream)) {
            return Err(PipelineError::AlreadyAttached(stream.name().to_string()));
        }

        let source_format = *stream.format();
        let mixer = Mixer::new(
            source_format,
            self.format,
            hint.resolve(self.default_resampler),
        );
        let sampler = mixer.sampler();
        let lead_pad = source_format.duration_of(sampler.pos_width_frames());
        let trim_pad = source_format.duration_of(sampler.neg_width_frames());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            stage = %self.name,
            input = stream.name(),
            usage = usage.map(StreamUsage::as_str),
            sampler = %mixer.sampler().policy(),
            "add_input"
        );

        stream.set_min_lead_time(self.lead.get() + lead_pad);
        let (gain_tx, gain_rx) = unbounded();
        let slot = Arc::new(InputSlot {
            id,
            stream,
            usage,
            mixer: Mutex::new(mixer),
            gain_tx,
            gain_rx,
            lead_pad,
            trim_pad,
        });
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(slot);
        self.inputs.store(Arc::new(next));
        self.topology.fetch_add(1, Ordering::AcqRel);

        Ok(InputHandle {
            stage: Arc::clone(&self.name),
            id,
        })
    }

    /// Detaches `stream`. The input set is unchanged on error.
    pub fn remove_input(&self, stream: &StreamRef) -> Result<(), PipelineError> {
        let _guard = self.mutation.lock();
        let current = self.inputs.load();
        let Some(index) = current
            .iter()
            .position(|slot| same_stream(&slot.stream, stream))
        else {
            return Err(PipelineError::NotAttached(stream.name().to_string()));
        };

        tracing::debug!(stage = %self.name, input = stream.name(), "remove_input");
        let next: Vec<_> = current
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        self.inputs.store(Arc::new(next));
        self.topology.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Queues a gain change for `stream`'s mixer. It takes effect from the
    /// input's next mix job; this never waits for a pull in progress.
    pub fn set_input_gain(
        &self,
        stream: &StreamRef,
        update: GainUpdate,
    ) -> Result<(), PipelineError> {
        let inputs = self.inputs.load();
        let slot = inputs
            .iter()
            .find(|slot| same_stream(&slot.stream, stream))
            .ok_or_else(|| PipelineError::NotAttached(stream.name().to_string()))?;
        // The slot owns the receiver, so the channel cannot be disconnected.
        let _ = slot.gain_tx.send(update);
        self.topology.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(stage = %self.name, input = stream.name(), ?update, "set_input_gain");
        Ok(())
    }

    /// Whether `stream` is attached here.
    pub fn contains(&self, stream: &StreamRef) -> bool {
        self.inputs
            .load()
            .iter()
            .any(|slot| same_stream(&slot.stream, stream))
    }

    /// Number of attached inputs, internal links included.
    pub fn input_count(&self) -> usize {
        self.inputs.load().len()
    }

    /// Handles of the attached inputs, in attach order.
    pub fn input_handles(&self) -> Vec<InputHandle> {
        self.inputs
            .load()
            .iter()
            .map(|slot| InputHandle {
                stage: Arc::clone(&self.name),
                id: slot.id,
            })
            .collect()
    }

    /// Running totals.
    pub fn stats(&self) -> MixStats {
        *self.stats.lock()
    }

    fn cached_prefix(
        cache: &CachedBlock,
        frame: i64,
        frame_count: usize,
        channels: usize,
    ) -> AudioData {
        let offset = (frame - cache.start) as usize;
        let frames = frame_count.min(cache.frames - offset);
        cache
            .data
            .slice(offset * channels, (offset + frames) * channels)
    }
}

impl ReadableStream for MixStage {
    fn format(&self) -> &Format {
        &self.format
    }

    fn read_lock(&self, ref_time: RefTime, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        debug_assert!(frame_count > 0, "zero-length read");
        if frame_count == 0 {
            return None;
        }
        let channels = self.format.channels() as usize;
        let snapshot: TimelineSnapshot = self.timeline.snapshot();
        let topology = self.topology.load(Ordering::Acquire);

        // Held for the whole job so concurrent readers of the same frames
        // see one mix, not two.
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref()
            && cached.covers(frame, snapshot.generation, topology)
        {
            let data = Self::cached_prefix(cached, frame, frame_count, channels);
            return Some(
                StreamBuffer::new(Fixed::from_frames(frame), channels as u32, data, snapshot)
                    .with_usage_mask(cached.usage_mask),
            );
        }

        let frames = frame_count.min(self.block_size);
        let mut accum = vec![0.0f64; frames * channels];
        let mut usage_mask = StreamUsageMask::EMPTY;
        let mut silent_frames = 0u64;
        let mut gap_frames = 0u64;
        let mut timeline_retries = 0u64;
        let job = MixJob {
            ref_time,
            dest_frame: frame,
            frame_count: frames,
            dest_timeline: snapshot.function,
            dest_clock: &self.clock,
        };

        let inputs = self.inputs.load();
        for slot in inputs.iter() {
            let outcome = {
                let mut mixer = slot.mixer.lock();
                while let Ok(update) = slot.gain_rx.try_recv() {
                    mixer.apply_gain_update(update);
                }
                mixer.mix(&*slot.stream, &job, &mut accum)
            };
            gap_frames += outcome.gap_frames;
            timeline_retries += outcome.timeline_retries;
            if outcome.silent {
                silent_frames += frames as u64;
            } else if let Some(usage) = slot.usage {
                usage_mask.insert(usage);
            } else {
                // Internal links carry the usages their stage mixed.
                usage_mask = usage_mask.union(outcome.usages);
            }
        }

        let data = finalize(&accum, self.format.sample_format());
        {
            let mut stats = self.stats.lock();
            stats.mix_jobs += 1;
            stats.silent_input_frames += silent_frames;
            stats.usages_mixed = usage_mask;
            stats.gap_frames += gap_frames;
            stats.timeline_retries += timeline_retries;
        }
        if self.topology.load(Ordering::Acquire) == topology {
            *cache = Some(CachedBlock {
                start: frame,
                frames,
                generation: snapshot.generation,
                topology,
                usage_mask,
                data: data.clone(),
            });
        } else {
            *cache = None;
        }

        Some(
            StreamBuffer::new(Fixed::from_frames(frame), channels as u32, data, snapshot)
                .with_usage_mask(usage_mask),
        )
    }

    fn trim(&self, ref_time: RefTime) {
        let previous = self
            .last_trim
            .fetch_max(ref_time.as_nanos(), Ordering::AcqRel);
        if ref_time.as_nanos() <= previous {
            return;
        }
        for slot in self.inputs.load().iter() {
            let input_clock = slot.stream.reference_clock();
            let local = translate_time(ref_time, &self.clock, &input_clock);
            slot.stream.trim(local.saturating_sub(slot.trim_pad));
        }
    }

    fn ref_time_to_frac_frame(&self) -> TimelineSnapshot {
        self.timeline.snapshot()
    }

    fn reference_clock(&self) -> ClockRef {
        Arc::clone(&self.clock)
    }

    fn set_min_lead_time(&self, lead: Duration) {
        self.lead.set(lead);
        for slot in self.inputs.load().iter() {
            let propagated = lead + slot.lead_pad;
            debug_assert!(propagated >= lead);
            slot.stream.set_min_lead_time(propagated);
        }
    }

    fn min_lead_time(&self) -> Duration {
        self.lead.get()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tributary_core::{
        ManualClock, SampleFormat, SignalSource, TimelineFunction, VersionedTimelineFunction,
        Waveform,
    };

    fn stage(sample_format: SampleFormat, block_size: usize) -> (MixStage, ClockRef) {
        let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
        let format = Format::new(sample_format, 2, 48000).unwrap();
        let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
            0,
            0,
            format.frac_frames_per_ns(),
        )));
        let stage = MixStage::new(
            "main",
            format,
            block_size,
            TimelineHandle::new(timeline),
            Arc::clone(&clock),
            ResamplerPolicy::Default,
        );
        (stage, clock)
    }

    fn constant(level: f32, clock: &ClockRef) -> StreamRef {
        let format = Format::float(2, 48000).unwrap();
        Arc::new(SignalSource::new(format, Waveform::Constant(level), Arc::clone(clock)))
    }

    #[test]
    fn empty_stage_produces_silence() {
        let (stage, _) = stage(SampleFormat::Unsigned8, 240);
        let buf = stage.read_lock(RefTime::ZERO, 0, 100).unwrap();
        assert_eq!(buf.frames(), 100);
        assert_eq!(buf.data(), &AudioData::Unsigned8(vec![0x80; 200]));
        assert!(buf.usage_mask().is_empty());
    }

    #[test]
    fn reads_are_capped_at_block_size() {
        let (stage, clock) = stage(SampleFormat::Float, 64);
        stage
            .add_input(constant(0.25, &clock), Some(StreamUsage::Media), ResamplerPolicy::Default)
            .unwrap();
        let buf = stage.read_lock(RefTime::ZERO, 0, 1000).unwrap();
        assert_eq!(buf.frames(), 64);
    }

    #[test]
    fn sums_inputs_and_tags_usages() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        stage
            .add_input(constant(0.25, &clock), Some(StreamUsage::Media), ResamplerPolicy::Default)
            .unwrap();
        stage
            .add_input(
                constant(0.125, &clock),
                Some(StreamUsage::Interruption),
                ResamplerPolicy::Point,
            )
            .unwrap();

        let buf = stage.read_lock(RefTime::ZERO, 0, 32).unwrap();
        assert!(buf.data().as_float().unwrap().iter().all(|&s| s == 0.375));
        assert!(buf.usage_mask().contains(StreamUsage::Media));
        assert!(buf.usage_mask().contains(StreamUsage::Interruption));
        assert!(!buf.usage_mask().contains(StreamUsage::Communication));
        assert_eq!(stage.stats().mix_jobs, 1);
    }

    #[test]
    fn duplicate_and_unknown_inputs_are_rejected() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        let input = constant(0.5, &clock);
        let handle = stage
            .add_input(Arc::clone(&input), None, ResamplerPolicy::Default)
            .unwrap();
        assert_eq!(handle.stage(), "main");
        assert!(matches!(
            stage.add_input(Arc::clone(&input), None, ResamplerPolicy::Default),
            Err(PipelineError::AlreadyAttached(_))
        ));

        let stranger = constant(0.5, &clock);
        assert!(matches!(
            stage.remove_input(&stranger),
            Err(PipelineError::NotAttached(_))
        ));
        assert_eq!(stage.input_count(), 1);
        assert_eq!(stage.input_handles(), vec![handle]);
    }

    #[test]
    fn reread_of_mixed_frames_hits_cache() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        stage
            .add_input(constant(0.5, &clock), None, ResamplerPolicy::Default)
            .unwrap();
        drop(stage.read_lock(RefTime::ZERO, 0, 240));
        let again = stage.read_lock(RefTime::ZERO, 120, 240).unwrap();
        assert_eq!(again.frames(), 120);
        assert_eq!(stage.stats().mix_jobs, 1);
    }

    #[test]
    fn gain_change_invalidates_cache() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        let input = constant(0.5, &clock);
        stage
            .add_input(Arc::clone(&input), None, ResamplerPolicy::Default)
            .unwrap();
        drop(stage.read_lock(RefTime::ZERO, 0, 16));
        stage.set_input_gain(&input, GainUpdate::Mute(true)).unwrap();

        let buf = stage.read_lock(RefTime::ZERO, 0, 16).unwrap();
        assert!(buf.data().as_float().unwrap().iter().all(|&s| s == 0.0));
        assert_eq!(stage.stats().mix_jobs, 2);
        assert_eq!(stage.stats().silent_input_frames, 16);
    }

    /// Parks inside `read_lock` until the test lets it go.
    struct GatedSource {
        inner: SignalSource,
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl ReadableStream for GatedSource {
        fn format(&self) -> &Format {
            self.inner.format()
        }

        fn read_lock(
            &self,
            ref_time: RefTime,
            frame: i64,
            frame_count: usize,
        ) -> Option<StreamBuffer> {
            self.entered.send(()).unwrap();
            self.release.recv().unwrap();
            self.inner.read_lock(ref_time, frame, frame_count)
        }

        fn trim(&self, ref_time: RefTime) {
            self.inner.trim(ref_time);
        }

        fn ref_time_to_frac_frame(&self) -> TimelineSnapshot {
            self.inner.ref_time_to_frac_frame()
        }

        fn reference_clock(&self) -> ClockRef {
            self.inner.reference_clock()
        }

        fn set_min_lead_time(&self, lead: Duration) {
            self.inner.set_min_lead_time(lead);
        }

        fn min_lead_time(&self) -> Duration {
            self.inner.min_lead_time()
        }
    }

    #[test]
    fn gain_change_does_not_wait_for_pull_in_progress() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let input: StreamRef = Arc::new(GatedSource {
            inner: SignalSource::new(
                Format::float(2, 48000).unwrap(),
                Waveform::Constant(0.5),
                Arc::clone(&clock),
            ),
            entered: entered_tx,
            release: release_rx,
        });
        stage
            .add_input(Arc::clone(&input), None, ResamplerPolicy::Point)
            .unwrap();

        std::thread::scope(|s| {
            let puller = s.spawn(|| {
                let buf = stage.read_lock(RefTime::ZERO, 0, 16).unwrap();
                buf.data().to_normalized()
            });

            // The pull is parked inside the source with the mixer locked.
            entered_rx.recv().unwrap();
            stage.set_input_gain(&input, GainUpdate::Mute(true)).unwrap();
            release_tx.send(()).unwrap();

            let first = puller.join().unwrap();
            assert!(first.iter().all(|&s| s == 0.5));
        });

        // The queued mute applies from the next job, which skips the source.
        release_tx.send(()).unwrap();
        let buf = stage.read_lock(RefTime::ZERO, 16, 16).unwrap();
        assert!(buf.data().as_float().unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn starved_input_is_reported() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        let silent: StreamRef = Arc::new(SignalSource::new(
            Format::float(2, 48000).unwrap(),
            Waveform::Silence,
            Arc::clone(&clock),
        ));
        stage.add_input(silent, None, ResamplerPolicy::Point).unwrap();
        drop(stage.read_lock(RefTime::ZERO, 0, 64));
        let stats = stage.stats();
        assert_eq!(stats.gap_frames, 64);
        assert_eq!(stats.timeline_retries, 0);
        assert_eq!(stats.silent_input_frames, 64);
    }

    #[test]
    fn lead_time_reaches_inputs() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        let input = constant(0.5, &clock);
        stage
            .add_input(Arc::clone(&input), None, ResamplerPolicy::Point)
            .unwrap();
        stage.set_min_lead_time(Duration::from_millis(5));
        assert_eq!(stage.min_lead_time(), Duration::from_millis(5));
        assert_eq!(input.min_lead_time(), Duration::from_millis(5));
    }

    #[test]
    fn trim_only_moves_forward() {
        let (stage, clock) = stage(SampleFormat::Float, 240);
        let source = Arc::new(SignalSource::new(
            Format::float(2, 48000).unwrap(),
            Waveform::Constant(0.5),
            Arc::clone(&clock),
        ));
        let input: StreamRef = source.clone();
        stage.add_input(input, None, ResamplerPolicy::Point).unwrap();

        stage.trim(RefTime::from_nanos(2_000_000));
        stage.trim(RefTime::from_nanos(1_000_000));
        stage.trim(RefTime::from_nanos(2_000_000));
        assert_eq!(source.last_trim(), Some(RefTime::from_nanos(2_000_000)));
    }
}
