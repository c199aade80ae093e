use super::check_channels;
use crate::effect::{AudioEffect, EffectParams};
use crate::error::EffectError;
use crate::param::{ParamValue, parse_param_value};

const NAME: &str = "delay";

/// Longest accepted delay.
pub const MAX_DELAY_SECONDS: f32 = 10.0;

/// Fixed delay line over interleaved frames.
///
/// Configuration: a time (`"10ms"`, `"0.5s"`) or a whole frame count
/// (`"480"`). Empty means no delay. The delay is reported as latency so
/// upstream lead times account for it.
#[derive(Debug, Clone)]
pub struct DelayEffect {
    channels: usize,
    frame_rate: u32,
    /// Interleaved ring of `delay_frames * channels` samples.
    ring: Vec<f32>,
    write_frame: usize,
    delay_frames: usize,
}

impl DelayEffect {
    /// Create a delay from construction parameters.
    ///
    /// # Errors
    ///
    /// Unsupported channel counts and unparseable or out of range delays.
    pub fn new(params: &EffectParams) -> Result<Self, EffectError> {
        let channels = check_channels(NAME, params.channels)? as usize;
        let delay_frames = parse_delay(&params.config, params.frame_rate)?;
        Ok(Self {
            channels,
            frame_rate: params.frame_rate,
            ring: vec![0.0; delay_frames * channels],
            write_frame: 0,
            delay_frames,
        })
    }

    /// Delay in frames.
    pub fn delay_frames(&self) -> usize {
        self.delay_frames
    }
}

fn parse_delay(config: &str, frame_rate: u32) -> Result<usize, EffectError> {
    let config = config.trim();
    if config.is_empty() {
        return Ok(0);
    }
    let max_frames = MAX_DELAY_SECONDS * frame_rate as f32;
    let frames = match parse_param_value(config) {
        Some(ParamValue::Seconds(s)) => libm::roundf(s * frame_rate as f32),
        Some(ParamValue::Number(n)) if n.fract() == 0.0 => n,
        _ => {
            return Err(EffectError::invalid_config(
                NAME,
                config,
                "expected a time or a whole frame count",
            ));
        }
    };
    if !(0.0..=max_frames).contains(&frames) {
        return Err(EffectError::invalid_config(
            NAME,
            config,
            format!("delay must be between 0 and {MAX_DELAY_SECONDS}s"),
        ));
    }
    Ok(frames as usize)
}

impl AudioEffect for DelayEffect {
    fn process_inplace(&mut self, frames: usize, samples: &mut [f32]) {
        if self.delay_frames == 0 {
            return;
        }
        let ch = self.channels;
        for frame in samples.chunks_exact_mut(ch).take(frames) {
            let slot = &mut self.ring[self.write_frame * ch..(self.write_frame + 1) * ch];
            for (s, delayed) in frame.iter_mut().zip(slot.iter_mut()) {
                std::mem::swap(s, delayed);
            }
            self.write_frame = (self.write_frame + 1) % self.delay_frames;
        }
    }

    fn update_configuration(&mut self, config: &str) -> Result<(), EffectError> {
        let delay_frames = parse_delay(config, self.frame_rate)?;
        if delay_frames != self.delay_frames {
            self.delay_frames = delay_frames;
            self.ring = vec![0.0; delay_frames * self.channels];
            self.write_frame = 0;
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.ring.fill(0.0);
        self.write_frame = 0;
    }

    fn latency_frames(&self) -> u32 {
        u32::try_from(self.delay_frames).unwrap_or(u32::MAX)
    }

    fn channels(&self) -> u32 {
        self.channels as u32
    }
}
