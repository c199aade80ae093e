use super::check_channels;
use crate::effect::{AudioEffect, EffectParams};
use crate::error::EffectError;
use crate::param::parse_param_value;

const NAME: &str = "gain";

/// Largest linear gain accepted (+24 dB).
const MAX_LINEAR_GAIN: f32 = 15.848_932;

/// Fixed level change.
///
/// Configuration: `"-6dB"`, `"0.5"`, `"50%"`, `"mute"`, or empty for unity.
#[derive(Debug, Clone)]
pub struct GainEffect {
    channels: u32,
    gain: f32,
}

impl GainEffect {
    /// Create a gain effect from construction parameters.
    ///
    /// # Errors
    ///
    /// Unsupported channel counts and unparseable configurations.
    pub fn new(params: &EffectParams) -> Result<Self, EffectError> {
        let channels = check_channels(NAME, params.channels)?;
        Ok(Self {
            channels,
            gain: parse_gain(&params.config)?,
        })
    }

    /// Current linear gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

fn parse_gain(config: &str) -> Result<f32, EffectError> {
    let config = config.trim();
    if config.is_empty() {
        return Ok(1.0);
    }
    if config.eq_ignore_ascii_case("mute") {
        return Ok(0.0);
    }
    let gain = parse_param_value(config)
        .and_then(|v| v.as_linear_gain())
        .ok_or_else(|| EffectError::invalid_config(NAME, config, "expected a level"))?;
    if !(0.0..=MAX_LINEAR_GAIN).contains(&gain) {
        return Err(EffectError::invalid_config(
            NAME,
            config,
            "level out of range (0 to +24dB)",
        ));
    }
    Ok(gain)
}

impl AudioEffect for GainEffect {
    fn process_inplace(&mut self, _frames: usize, samples: &mut [f32]) {
        if self.gain == 1.0 {
            return;
        }
        for s in samples {
            *s *= self.gain;
        }
    }

    fn update_configuration(&mut self, config: &str) -> Result<(), EffectError> {
        self.gain = parse_gain(config)?;
        Ok(())
    }

    fn channels(&self) -> u32 {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain(config: &str) -> Result<GainEffect, EffectError> {
        GainEffect::new(&EffectParams::new(48000, 2).with_config(config))
    }

    #[test]
    fn config_forms() {
        assert_eq!(gain("").unwrap().gain(), 1.0);
        assert_eq!(gain("0.5").unwrap().gain(), 0.5);
        assert_eq!(gain("50%").unwrap().gain(), 0.5);
        assert_eq!(gain("MUTE").unwrap().gain(), 0.0);
        assert!((gain("-6dB").unwrap().gain() - 0.501_187).abs() < 1e-5);
    }

    #[test]
    fn rejects_bad_levels() {
        assert!(gain("loud").is_err());
        assert!(gain("-0.5").is_err());
        assert!(gain("30dB").is_err());
        assert!(gain("10ms").is_err());
    }

    #[test]
    fn rejected_update_keeps_previous_level() {
        let mut fx = gain("0.5").unwrap();
        assert!(fx.update_configuration("nonsense").is_err());
        let mut samples = [1.0, -1.0];
        fx.process_inplace(1, &mut samples);
        assert_eq!(samples, [0.5, -0.5]);
    }

    #[test]
    fn rejects_zero_channels() {
        let err = GainEffect::new(&EffectParams::new(48000, 0)).unwrap_err();
        assert!(matches!(err, EffectError::UnsupportedChannels { channels: 0, .. }));
    }
}
