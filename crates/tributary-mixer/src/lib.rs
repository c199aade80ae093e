//! Tributary Mixer - per-input format conversion for the mix graph
//!
//! A [`Mixer`] adds one source stream into a mix group's accumulator. It
//! handles everything that differs between the source and the group:
//!
//! - **Timing**: source and destination may run on different clocks and frame
//!   rates; positions come from composed timeline functions.
//! - **Resampling**: [`Sampler`] is either a [`PointSampler`] or a
//!   [`SincSampler`], selected by [`ResamplerPolicy`].
//! - **Channels**: [`ChannelMap`] copies, fans out, averages or folds.
//! - **Gain**: [`Gain`] combines source and destination dB with linear ramps.
//! - **Output**: accumulation is `f64`; [`finalize`] saturates into the
//!   destination sample format.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tributary_core::{ClockRef, Format, ManualClock, RefTime, SignalSource, TimelineFunction, Waveform};
//! use tributary_mixer::{MixJob, Mixer, ResamplerPolicy, finalize};
//!
//! let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
//! let src_format = Format::float(1, 44100).unwrap();
//! let dest_format = Format::float(2, 48000).unwrap();
//! let source = SignalSource::new(src_format, Waveform::Constant(0.5), Arc::clone(&clock));
//!
//! let mut mixer = Mixer::new(src_format, dest_format, ResamplerPolicy::Default);
//! let mut accum = vec![0.0f64; 2 * 240];
//! let job = MixJob {
//!     ref_time: RefTime::ZERO,
//!     dest_frame: 480,
//!     frame_count: 240,
//!     dest_timeline: TimelineFunction::new(0, 0, dest_format.frac_frames_per_ns()),
//!     dest_clock: &clock,
//! };
//! mixer.mix(&source, &job, &mut accum);
//!
//! let out = finalize(&accum, dest_format.sample_format());
//! assert!((out.normalized(0) - 0.5).abs() < 1e-4);
//! ```

pub mod channel;
pub mod gain;
pub mod mixer;
pub mod policy;
pub mod sampler;

pub use channel::ChannelMap;
pub use gain::{
    Gain, GainUpdate, MAX_GAIN_DB, MUTED_GAIN_DB, UNITY_GAIN_DB, db_to_scale, scale_to_db,
};
pub use mixer::{MixJob, MixOutcome, Mixer, MixerStats, finalize};
pub use policy::ResamplerPolicy;
pub use sampler::{PointSampler, SINC_HALF_WIDTH, SINC_PHASES, SINC_TAPS, Sampler, SincSampler};
