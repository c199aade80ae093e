use crate::effect::AudioEffect;
use crate::error::EffectError;

/// Leaves audio untouched. Accepts and ignores any configuration.
#[derive(Debug, Clone)]
pub struct PassthroughEffect {
    channels: u32,
}

impl PassthroughEffect {
    /// Create a pass-through for `channels` interleaved channels.
    pub fn new(channels: u32) -> Self {
        Self { channels }
    }
}

impl AudioEffect for PassthroughEffect {
    fn process_inplace(&mut self, _frames: usize, _samples: &mut [f32]) {}

    fn update_configuration(&mut self, _config: &str) -> Result<(), EffectError> {
        Ok(())
    }

    fn channels(&self) -> u32 {
        self.channels
    }
}
