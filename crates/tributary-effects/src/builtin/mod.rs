//! Built-in effects.
//!
//! These are deliberately small: they exist to exercise the hosting
//! contract (configuration, latency, flushing) rather than to sound good.

mod delay;
mod gain;
mod passthrough;

pub use delay::{DelayEffect, MAX_DELAY_SECONDS};
pub use gain::GainEffect;
pub use passthrough::PassthroughEffect;

use crate::error::EffectError;

/// Largest channel count a built-in effect accepts.
pub const MAX_EFFECT_CHANNELS: u32 = 8;

pub(crate) fn check_channels(effect: &str, channels: u32) -> Result<u32, EffectError> {
    if (1..=MAX_EFFECT_CHANNELS).contains(&channels) {
        Ok(channels)
    } else {
        Err(EffectError::UnsupportedChannels {
            effect: effect.to_string(),
            channels,
        })
    }
}
