//! Effects stage: an ordered effect chain over one child stream.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;

use tributary_core::{
    AudioData, ClockRef, Fixed, Format, LeadTime, ReadableStream, RefTime, SampleFormat,
    StreamBuffer, StreamRef, StreamUsageMask, TimelineSnapshot,
};
use tributary_effects::{AudioEffect, UpdateEffectError};

use crate::error::PipelineError;

/// A named effect in a chain.
pub struct EffectInstance {
    name: String,
    effect_type: String,
    effect: Box<dyn AudioEffect>,
}

impl EffectInstance {
    /// Wraps an effect created for this chain.
    pub fn new(
        name: impl Into<String>,
        effect_type: impl Into<String>,
        effect: Box<dyn AudioEffect>,
    ) -> Self {
        Self {
            name: name.into(),
            effect_type: effect_type.into(),
            effect,
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered type the instance was created from.
    pub fn effect_type(&self) -> &str {
        &self.effect_type
    }
}

impl fmt::Debug for EffectInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectInstance")
            .field("name", &self.name)
            .field("effect_type", &self.effect_type)
            .field("latency_frames", &self.effect.latency_frames())
            .finish_non_exhaustive()
    }
}

struct ProcessedBlock {
    start: i64,
    frames: usize,
    generation: u64,
    continuous: bool,
    usage_mask: StreamUsageMask,
    samples: Vec<f32>,
}

struct Chain {
    effects: Vec<EffectInstance>,
    last: Option<ProcessedBlock>,
}

/// Runs a child stream through an ordered chain of effects.
///
/// The child is pulled without holding the chain lock; the chain lock is
/// then held while one buffer is processed or one update is applied, so a
/// pull sees either the whole old configuration or the whole new one.
pub struct EffectsStage {
    name: String,
    child: StreamRef,
    format: Format,
    passthrough: bool,
    chain: Mutex<Chain>,
    lead: LeadTime,
}

impl EffectsStage {
    /// Wraps `child` with `effects`, applied in order.
    ///
    /// The child must produce float samples.
    pub fn new(
        name: impl Into<String>,
        child: StreamRef,
        effects: Vec<EffectInstance>,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let format = *child.format();
        if format.sample_format() != SampleFormat::Float {
            return Err(PipelineError::EffectsRequireFloat {
                stage: name,
                sample_format: format.sample_format(),
            });
        }
        debug_assert!(
            effects
                .iter()
                .all(|e| e.effect.channels() == format.channels())
        );
        tracing::debug!(
            stage = %name,
            effects = effects.len(),
            "effects_stage_create"
        );
        Ok(Self {
            name,
            child,
            format,
            passthrough: effects.is_empty(),
            chain: Mutex::new(Chain {
                effects,
                last: None,
            }),
            lead: LeadTime::new(),
        })
    }

    /// Reconfigures one instance. On error the chain is unchanged.
    pub fn update_effect(&self, instance: &str, config: &str) -> Result<(), UpdateEffectError> {
        let mut chain = self.chain.lock();
        let effect = chain
            .effects
            .iter_mut()
            .find(|e| e.name == instance)
            .ok_or_else(|| UpdateEffectError::UnknownInstance(instance.to_string()))?;

        if let Err(source) = effect.effect.update_configuration(config) {
            tracing::warn!(
                stage = %self.name,
                instance,
                config,
                error = %source,
                "effect rejected configuration"
            );
            return Err(UpdateEffectError::RejectedConfig {
                instance: instance.to_string(),
                source,
            });
        }
        chain.last = None;
        tracing::debug!(stage = %self.name, instance, config, "update_effect");
        Ok(())
    }

    /// Instance names in chain order.
    pub fn instance_names(&self) -> Vec<String> {
        self.chain
            .lock()
            .effects
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// `(instance, type)` pairs in chain order.
    pub fn instances(&self) -> Vec<(String, String)> {
        self.chain
            .lock()
            .effects
            .iter()
            .map(|e| (e.name.clone(), e.effect_type.clone()))
            .collect()
    }

    /// Whether an instance with this name is in the chain.
    pub fn contains_instance(&self, instance: &str) -> bool {
        self.chain.lock().effects.iter().any(|e| e.name == instance)
    }

    /// Total latency of the chain in frames.
    pub fn latency_frames(&self) -> u64 {
        self.chain
            .lock()
            .effects
            .iter()
            .map(|e| u64::from(e.effect.latency_frames()))
            .sum()
    }

    /// The wrapped stream.
    pub fn child(&self) -> &StreamRef {
        &self.child
    }

    fn cached(&self, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        let chain = self.chain.lock();
        let last = chain.last.as_ref()?;
        let snapshot = self.child.ref_time_to_frac_frame();
        if last.generation != snapshot.generation
            || frame < last.start
            || frame >= last.start + last.frames as i64
        {
            return None;
        }
        let channels = self.format.channels() as usize;
        let offset = (frame - last.start) as usize;
        let frames = frame_count.min(last.frames - offset);
        let samples = last.samples[offset * channels..(offset + frames) * channels].to_vec();
        Some(
            StreamBuffer::new(
                Fixed::from_frames(frame),
                channels as u32,
                AudioData::Float(samples),
                snapshot,
            )
            .with_continuity(last.continuous)
            .with_usage_mask(last.usage_mask),
        )
    }
}

impl ReadableStream for EffectsStage {
    fn format(&self) -> &Format {
        &self.format
    }

    fn read_lock(&self, ref_time: RefTime, frame: i64, frame_count: usize) -> Option<StreamBuffer> {
        if self.passthrough {
            return self.child.read_lock(ref_time, frame, frame_count);
        }
        if let Some(buffer) = self.cached(frame, frame_count) {
            return Some(buffer);
        }

        let mut buffer = self.child.read_lock(ref_time, frame, frame_count)?;
        let frames = buffer.frames();
        let start = buffer.start().round();
        let generation = buffer.timeline().generation;
        let continuous = buffer.is_continuous();
        let usage_mask = buffer.usage_mask();

        // The child format is checked to be float at construction.
        if let Some(samples) = buffer.data_mut().as_float_mut() {
            let mut chain = self.chain.lock();
            for instance in &mut chain.effects {
                instance.effect.process_inplace(frames, samples);
            }
            chain.last = Some(ProcessedBlock {
                start,
                frames,
                generation,
                continuous,
                usage_mask,
                samples: samples.to_vec(),
            });
        }
        Some(buffer)
    }

    fn trim(&self, ref_time: RefTime) {
        self.child.trim(ref_time);
    }

    fn ref_time_to_frac_frame(&self) -> TimelineSnapshot {
        self.child.ref_time_to_frac_frame()
    }

    fn reference_clock(&self) -> ClockRef {
        self.child.reference_clock()
    }

    fn set_min_lead_time(&self, lead: Duration) {
        self.lead.set(lead);
        let latency = self.latency_frames();
        let propagated = lead + self.format.duration_of(latency as i64);
        debug_assert!(propagated >= lead);
        self.child.set_min_lead_time(propagated);
    }

    fn min_lead_time(&self) -> Duration {
        self.lead.get()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for EffectsStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectsStage")
            .field("name", &self.name)
            .field("child", &self.child.name())
            .field("format", &self.format)
            .field("effects", &self.chain.lock().effects)
            .finish_non_exhaustive()
    }
}
