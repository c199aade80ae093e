//! Tributary Pipeline - the mix graph
//!
//! An [`OutputPipeline`] is built from a validated
//! [`PipelineConfig`](tributary_config::PipelineConfig). Each mix group
//! becomes a [`MixStage`], optionally wrapped in an [`EffectsStage`]; child
//! groups are attached to their parent as ordinary inputs. External streams
//! are routed to a group by their [`StreamUsage`](tributary_core::StreamUsage),
//! and one group may be tapped for loopback capture through a
//! [`LoopbackTap`], which replays what the main path produced without ever
//! pulling the graph itself.
//!
//! Every node implements [`ReadableStream`](tributary_core::ReadableStream),
//! so the hardware consumer pulls the pipeline exactly the way a mix stage
//! pulls its inputs.
//!
//! # Threading
//!
//! Pulls run on one mix thread per pipeline. Attach, detach, gain and effect
//! updates may come from any thread: input lists are swapped atomically,
//! gain changes are queued for the next job, and effect chains are updated
//! under a short lock, so each pull sees a consistent topology. A loopback
//! client on its own thread only ever takes the capture ring's lock.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tributary_config::{EffectSpec, MixGroupConfig, PipelineConfig};
//! use tributary_core::{
//!     ClockRef, Format, ManualClock, ReadableStream, RefTime, SignalSource, StreamRef,
//!     StreamUsage, TimelineFunction, VersionedTimelineFunction, Waveform,
//! };
//! use tributary_effects::EffectRegistry;
//! use tributary_mixer::ResamplerPolicy;
//! use tributary_pipeline::{OutputPipeline, PipelineOptions};
//!
//! let config = PipelineConfig::new("out").with_group(
//!     MixGroupConfig::new("out")
//!         .with_usage(StreamUsage::Media)
//!         .with_effect(EffectSpec::new("gain", "master").with_config("0.5")),
//! );
//!
//! let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
//! let format = Format::float(2, 48000).unwrap();
//! let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
//!     0,
//!     0,
//!     format.frac_frames_per_ns(),
//! )));
//! let pipeline = OutputPipeline::new(
//!     &config,
//!     &EffectRegistry::new(),
//!     PipelineOptions::default(),
//!     timeline,
//!     Arc::clone(&clock),
//! )
//! .unwrap();
//!
//! let tone: StreamRef = Arc::new(SignalSource::new(format, Waveform::Constant(0.5), clock));
//! pipeline
//!     .add_input(Arc::clone(&tone), StreamUsage::Media, ResamplerPolicy::Default)
//!     .unwrap();
//! assert_eq!(pipeline.read_lock(RefTime::ZERO, 0, 240).unwrap().sample(0, 0), 0.25);
//! pipeline.remove_input(&tone).unwrap();
//! ```

pub mod effects_stage;
pub mod error;
pub mod loopback;
pub mod mix_stage;
pub mod pipeline;

pub use effects_stage::{EffectInstance, EffectsStage};
pub use error::PipelineError;
pub use loopback::{LOOPBACK_CAPACITY_BLOCKS, LoopbackCapture, LoopbackTap};
pub use mix_stage::{InputHandle, MixStage, MixStats};
pub use pipeline::{EffectInstanceInfo, OutputPipeline, PipelineOptions};
