//! The output pipeline: a mix graph built from a topology.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use tributary_config::{MixGroupConfig, PipelineConfig, ValidationError};
use tributary_core::{
    ClockRef, Format, ReadableStream, RefTime, StreamBuffer, StreamRef, StreamUsage,
    TimelineHandle, TimelineRate, TimelineSnapshot, VersionedTimelineFunction,
};
use tributary_effects::{EffectParams, EffectRegistry, UpdateEffectError};
use tributary_mixer::{GainUpdate, ResamplerPolicy};

use crate::effects_stage::{EffectInstance, EffectsStage};
use crate::error::PipelineError;
use crate::loopback::{LOOPBACK_CAPACITY_BLOCKS, LoopbackCapture};
use crate::mix_stage::{InputHandle, MixStage, MixStats};

/// Overrides applied on top of a topology when building a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Replaces the topology's `block_size_frames`.
    pub max_block_size_frames: Option<u32>,
    /// Replaces the topology's default resampler.
    pub default_resampler: Option<ResamplerPolicy>,
}

/// One effect instance as seen from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectInstanceInfo {
    /// Owning group.
    pub group: String,
    /// Instance name.
    pub instance: String,
    /// Registered effect type.
    pub effect_type: String,
}

struct GroupNode {
    name: String,
    mix: Arc<MixStage>,
    effects: Option<Arc<EffectsStage>>,
}

struct Builder<'a> {
    config: &'a PipelineConfig,
    registry: &'a EffectRegistry,
    block_size: usize,
    resampler: ResamplerPolicy,
    timeline: Arc<VersionedTimelineFunction>,
    clock: ClockRef,
    root_rate: u32,
    groups: Vec<GroupNode>,
    routes: BTreeMap<StreamUsage, usize>,
    loopback: Option<StreamRef>,
}

impl Builder<'_> {
    /// Builds `group` and, depth first, every group below it. Returns the
    /// group's output node.
    fn build(&mut self, group: &MixGroupConfig) -> Result<StreamRef, PipelineError> {
        let format = group.format()?;
        let timeline = if format.frames_per_second() == self.root_rate {
            TimelineHandle::new(Arc::clone(&self.timeline))
        } else {
            TimelineHandle::scaled(
                Arc::clone(&self.timeline),
                TimelineRate::new(
                    u64::from(format.frames_per_second()),
                    u64::from(self.root_rate),
                ),
            )
        };
        let mix = Arc::new(MixStage::new(
            group.name.clone(),
            format,
            self.block_size,
            timeline,
            Arc::clone(&self.clock),
            self.resampler,
        ));

        let config = self.config;
        for child_name in &group.inputs {
            let Some(child) = config.group(child_name) else {
                continue;
            };
            let child_node = self.build(child)?;
            mix.add_input(child_node, None, ResamplerPolicy::Default)?;
        }

        let effects = if group.effects.is_empty() {
            None
        } else {
            let instances = group
                .effects
                .iter()
                .map(|spec| {
                    let params = EffectParams::new(format.frames_per_second(), format.channels())
                        .with_config(spec.config.clone());
                    self.registry
                        .create(&spec.effect_type, &params)
                        .map(|effect| {
                            EffectInstance::new(&spec.instance, &spec.effect_type, effect)
                        })
                        .map_err(|source| PipelineError::effect(&spec.instance, source))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let mix_node: StreamRef = mix.clone();
            Some(Arc::new(EffectsStage::new(
                group.name.clone(),
                mix_node,
                instances,
            )?))
        };

        let mut node: StreamRef = match &effects {
            Some(stage) => Arc::clone(stage) as StreamRef,
            None => Arc::clone(&mix) as StreamRef,
        };
        if group.loopback {
            let capture = LoopbackCapture::new(node, self.block_size * LOOPBACK_CAPACITY_BLOCKS);
            self.loopback = Some(Arc::new(capture.tap()));
            node = Arc::new(capture);
        }

        let index = self.groups.len();
        for &usage in &group.usages {
            self.routes.insert(usage, index);
        }
        self.groups.push(GroupNode {
            name: group.name.clone(),
            mix,
            effects,
        });
        Ok(node)
    }
}

/// A mix graph that routes input streams by usage and produces one output.
///
/// The pipeline is itself a [`ReadableStream`]: its hardware-facing consumer
/// pulls it like any other stream.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tributary_config::PipelineConfig;
/// use tributary_core::{
///     ClockRef, Format, ManualClock, ReadableStream, RefTime, SignalSource, StreamRef,
///     StreamUsage, TimelineFunction, VersionedTimelineFunction, Waveform,
/// };
/// use tributary_effects::EffectRegistry;
/// use tributary_mixer::ResamplerPolicy;
/// use tributary_pipeline::{OutputPipeline, PipelineOptions};
///
/// let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
/// let format = Format::float(2, 48000).unwrap();
/// let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
///     0,
///     0,
///     format.frac_frames_per_ns(),
/// )));
/// let pipeline = OutputPipeline::new(
///     &PipelineConfig::default(),
///     &EffectRegistry::new(),
///     PipelineOptions::default(),
///     timeline,
///     Arc::clone(&clock),
/// )
/// .unwrap();
///
/// let music: StreamRef = Arc::new(SignalSource::new(format, Waveform::Constant(0.25), clock));
/// pipeline
///     .add_input(Arc::clone(&music), StreamUsage::Media, ResamplerPolicy::Default)
///     .unwrap();
///
/// let out = pipeline.read_lock(RefTime::ZERO, 0, 240).unwrap();
/// assert_eq!(out.frames(), 240);
/// assert_eq!(out.sample(0, 0), 0.25);
/// drop(out);
///
/// pipeline.remove_input(&music).unwrap();
/// ```
pub struct OutputPipeline {
    root: StreamRef,
    groups: Vec<GroupNode>,
    routes: BTreeMap<StreamUsage, usize>,
    loopback: Option<StreamRef>,
    /// Serializes attach and detach across groups so a stream has at most
    /// one owner.
    attach: Mutex<()>,
    attached: AtomicUsize,
}

impl OutputPipeline {
    /// Builds the mix graph described by `config`.
    ///
    /// `timeline` maps reference time on `clock` to fractional frames of the
    /// root group; groups at other rates see it scaled to their own rate.
    pub fn new(
        config: &PipelineConfig,
        registry: &EffectRegistry,
        options: PipelineOptions,
        timeline: Arc<VersionedTimelineFunction>,
        clock: ClockRef,
    ) -> Result<Self, PipelineError> {
        let mut config_view = config.clone();
        if let Some(frames) = options.max_block_size_frames {
            config_view.block_size_frames = frames;
        }
        config_view.validate()?;

        let Some(root_group) = config_view.root_group() else {
            return Err(ValidationError::UnknownRoot(config_view.root.clone()).into());
        };
        let root_rate = root_group.frame_rate;

        let mut builder = Builder {
            config: &config_view,
            registry,
            block_size: config_view.block_size_frames as usize,
            resampler: options.default_resampler.unwrap_or(config_view.resampler),
            timeline,
            clock,
            root_rate,
            groups: Vec::with_capacity(config_view.groups.len()),
            routes: BTreeMap::new(),
            loopback: None,
        };
        let root = builder.build(root_group)?;

        tracing::debug!(
            root = %config_view.root,
            groups = builder.groups.len(),
            block_size = builder.block_size,
            resampler = %builder.resampler,
            loopback = builder.loopback.is_some(),
            "output_pipeline_create"
        );

        Ok(Self {
            root,
            groups: builder.groups,
            routes: builder.routes,
            loopback: builder.loopback,
            attach: Mutex::new(()),
            attached: AtomicUsize::new(0),
        })
    }

    fn owner_of(&self, stream: &StreamRef) -> Option<&GroupNode> {
        self.groups.iter().find(|g| g.mix.contains(stream))
    }

    /// Attaches `stream` to the group that accepts `usage`.
    pub fn add_input(
        &self,
        stream: StreamRef,
        usage: StreamUsage,
        hint: ResamplerPolicy,
    ) -> Result<InputHandle, PipelineError> {
        let Some(&index) = self.routes.get(&usage) else {
            tracing::warn!(usage = %usage, input = stream.name(), "no group accepts usage");
            return Err(PipelineError::UnroutableUsage(usage));
        };
        let _guard = self.attach.lock();
        if self.owner_of(&stream).is_some() {
            return Err(PipelineError::AlreadyAttached(stream.name().to_string()));
        }
        let handle = self.groups[index].mix.add_input(stream, Some(usage), hint)?;
        self.attached.fetch_add(1, Ordering::AcqRel);
        Ok(handle)
    }

    /// Detaches `stream` from whichever group owns it.
    pub fn remove_input(&self, stream: &StreamRef) -> Result<(), PipelineError> {
        let _guard = self.attach.lock();
        let group = self
            .owner_of(stream)
            .ok_or_else(|| PipelineError::NotAttached(stream.name().to_string()))?;
        group.mix.remove_input(stream)?;
        self.attached.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    /// Changes the gain of an attached input.
    pub fn set_input_gain(
        &self,
        stream: &StreamRef,
        update: GainUpdate,
    ) -> Result<(), PipelineError> {
        let group = self
            .owner_of(stream)
            .ok_or_else(|| PipelineError::NotAttached(stream.name().to_string()))?;
        group.mix.set_input_gain(stream, update)
    }

    /// Reconfigures the effect instance named `instance`, wherever it is.
    pub fn update_effect(&self, instance: &str, config: &str) -> Result<(), UpdateEffectError> {
        self.groups
            .iter()
            .filter_map(|g| g.effects.as_ref())
            .find(|stage| stage.contains_instance(instance))
            .ok_or_else(|| UpdateEffectError::UnknownInstance(instance.to_string()))?
            .update_effect(instance, config)
    }

    /// The loopback stream, if the topology taps a group.
    pub fn loopback(&self) -> Option<StreamRef> {
        self.loopback.clone()
    }

    /// Usage to group name, for every routed usage.
    pub fn routing_table(&self) -> BTreeMap<StreamUsage, String> {
        self.routes
            .iter()
            .map(|(&usage, &index)| (usage, self.groups[index].name.clone()))
            .collect()
    }

    /// Name of the group that accepts `usage`.
    pub fn stage_for_usage(&self, usage: StreamUsage) -> Option<&str> {
        self.routes
            .get(&usage)
            .map(|&index| self.groups[index].name.as_str())
    }

    /// Every effect instance, in build order.
    pub fn effect_instances(&self) -> Vec<EffectInstanceInfo> {
        self.groups
            .iter()
            .filter_map(|g| g.effects.as_ref().map(|stage| (g, stage)))
            .flat_map(|(g, stage)| {
                stage
                    .instances()
                    .into_iter()
                    .map(|(instance, effect_type)| EffectInstanceInfo {
                        group: g.name.clone(),
                        instance,
                        effect_type,
                    })
            })
            .collect()
    }

    /// External inputs currently attached.
    pub fn input_count(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    /// Per-group mix statistics.
    pub fn stats(&self) -> BTreeMap<String, MixStats> {
        self.groups
            .iter()
            .map(|g| (g.name.clone(), g.mix.stats()))
            .collect()
    }

    /// The mix stage of a group.
    pub fn mix_stage(&self, group: &str) -> Option<&Arc<MixStage>> {
        self.groups.iter().find(|g| g.name == group).map(|g| &g.mix)
    }

    /// Group names in build order (children before parents).
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }
}

impl ReadableStream for OutputPipeline {
    fn format(&self) -> &Format {
        self.root.format()
    }

    fn read_lock(&self, ref_time: RefTime, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        self.root.read_lock(ref_time, frame, frame_count)
    }

    fn trim(&self, ref_time: RefTime) {
        self.root.trim(ref_time);
    }

    fn ref_time_to_frac_frame(&self) -> TimelineSnapshot {
        self.root.ref_time_to_frac_frame()
    }

    fn reference_clock(&self) -> ClockRef {
        self.root.reference_clock()
    }

    fn set_min_lead_time(&self, lead: Duration) {
        self.root.set_min_lead_time(lead);
    }

    fn min_lead_time(&self) -> Duration {
        self.root.min_lead_time()
    }

    fn name(&self) -> &str {
        self.root.name()
    }
}

impl Drop for OutputPipeline {
    fn drop(&mut self) {
        let attached = self.attached.load(Ordering::Acquire);
        if attached > 0 {
            tracing::warn!(attached, "output pipeline dropped with inputs still attached");
        }
    }
}
