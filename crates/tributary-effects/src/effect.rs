//! The effect hosting contract.

use crate::error::EffectError;

/// Construction parameters handed to an effect factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectParams {
    /// Frame rate of the stream the effect will process.
    pub frame_rate: u32,
    /// Interleaved channel count.
    pub channels: u32,
    /// Initial configuration payload (may be empty).
    pub config: String,
}

impl EffectParams {
    /// Create parameters with an empty configuration.
    pub fn new(frame_rate: u32, channels: u32) -> Self {
        Self {
            frame_rate,
            channels,
            config: String::new(),
        }
    }

    /// Set the initial configuration payload.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }
}

/// An in-place effect hosted by an effects stage.
///
/// Effects process interleaved `f32` frames. An effect is owned by exactly
/// one chain and is only ever called from one thread at a time; the stage
/// serializes processing against configuration updates.
///
/// # Implementing
///
/// ```rust
/// use tributary_effects::{AudioEffect, EffectError};
///
/// struct Invert { channels: u32 }
///
/// impl AudioEffect for Invert {
///     fn process_inplace(&mut self, _frames: usize, samples: &mut [f32]) {
///         for s in samples {
///             *s = -*s;
///         }
///     }
///
///     fn update_configuration(&mut self, _config: &str) -> Result<(), EffectError> {
///         Ok(())
///     }
///
///     fn channels(&self) -> u32 {
///         self.channels
///     }
/// }
/// ```
pub trait AudioEffect: Send {
    /// Process `frames` interleaved frames in place.
    ///
    /// `samples.len()` is `frames * channels()`.
    fn process_inplace(&mut self, frames: usize, samples: &mut [f32]);

    /// Apply a new configuration payload.
    ///
    /// On error the previous configuration stays in effect.
    fn update_configuration(&mut self, config: &str) -> Result<(), EffectError>;

    /// Drop any internal history (delay lines, filter state).
    fn flush(&mut self) {}

    /// Processing latency in frames.
    fn latency_frames(&self) -> u32 {
        0
    }

    /// Channel count the effect was created for.
    fn channels(&self) -> u32;
}
