//! Samplers: turn a window of source frames into output frames at arbitrary
//! fractional positions.

mod point;
mod sinc;

pub use point::PointSampler;
pub use sinc::{SINC_HALF_WIDTH, SINC_PHASES, SINC_TAPS, SincSampler};

use tributary_core::Fixed;

use crate::policy::ResamplerPolicy;

/// The sampler chosen for one input.
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Nearest frame.
    Point(PointSampler),
    /// Windowed sinc.
    WindowedSinc(SincSampler),
}

impl Sampler {
    /// Builds the sampler for `policy`. `Default` picks point sampling when the
    /// rates match and windowed sinc otherwise.
    pub fn new(policy: ResamplerPolicy, source_rate: u32, dest_rate: u32) -> Self {
        match policy {
            ResamplerPolicy::Point => Sampler::Point(PointSampler),
            ResamplerPolicy::WindowedSinc => {
                Sampler::WindowedSinc(SincSampler::new(source_rate, dest_rate))
            }
            ResamplerPolicy::Default if source_rate == dest_rate => Sampler::Point(PointSampler),
            ResamplerPolicy::Default => {
                Sampler::WindowedSinc(SincSampler::new(source_rate, dest_rate))
            }
        }
    }

    /// The concrete policy in use.
    pub fn policy(&self) -> ResamplerPolicy {
        match self {
            Sampler::Point(_) => ResamplerPolicy::Point,
            Sampler::WindowedSinc(_) => ResamplerPolicy::WindowedSinc,
        }
    }

    /// Source frames needed before an output position.
    pub fn neg_width_frames(&self) -> i64 {
        match self {
            Sampler::Point(_) => 0,
            Sampler::WindowedSinc(s) => s.neg_width_frames(),
        }
    }

    /// Source frames needed after an output position.
    pub fn pos_width_frames(&self) -> i64 {
        match self {
            Sampler::Point(_) => 0,
            Sampler::WindowedSinc(s) => s.pos_width_frames(),
        }
    }

    /// Inclusive range of source frames needed for positions `first..=last`.
    pub fn span(&self, first: Fixed, last: Fixed) -> (i64, i64) {
        match self {
            Sampler::Point(s) => s.span(first, last),
            Sampler::WindowedSinc(s) => s.span(first, last),
        }
    }

    /// Renders one output frame at `rel` frames into `window`.
    #[inline]
    pub fn sample(&self, window: &[f32], channels: usize, rel: Fixed, out: &mut [f32]) {
        match self {
            Sampler::Point(s) => s.sample(window, channels, rel, out),
            Sampler::WindowedSinc(s) => s.sample(window, channels, rel, out),
        }
    }
}
