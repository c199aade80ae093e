//! Nearest-frame sampler.

use tributary_core::Fixed;

/// Picks the source frame nearest each output position (half rounds up).
///
/// Filter widths are zero, so a read never needs history or lookahead, and
/// when output positions land exactly on source frames the output is a
/// bit-exact copy of the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointSampler;

impl PointSampler {
    /// Source frames needed to render positions `first..=last`.
    pub fn span(&self, first: Fixed, last: Fixed) -> (i64, i64) {
        (first.round(), last.round())
    }

    /// Writes the frame nearest `rel` (relative to `window`'s first frame).
    #[inline]
    pub fn sample(&self, window: &[f32], channels: usize, rel: Fixed, out: &mut [f32]) {
        let index = rel.round().max(0) as usize * channels;
        out.copy_from_slice(&window[index..index + channels]);
    }
}
