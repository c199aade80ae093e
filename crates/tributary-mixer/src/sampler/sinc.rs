//! Windowed-sinc sampler.
//!
//! Each output sample is a weighted sum of [`SINC_TAPS`] source frames around
//! the output position. Weights come from a table of [`SINC_PHASES`] + 1
//! sub-frame phases of a Blackman-windowed sinc, linearly interpolated
//! between adjacent phases. When downsampling, the sinc is stretched to cut
//! off at the destination Nyquist frequency. Every phase is normalized to unity
//! DC gain, so constant input maps to the same constant.

use std::f64::consts::PI;

use tributary_core::{FRAC_ONE, Fixed};

/// Half the filter length in frames.
pub const SINC_HALF_WIDTH: usize = 8;
/// Filter taps per output sample.
pub const SINC_TAPS: usize = 2 * SINC_HALF_WIDTH;
/// Sub-frame phases in the coefficient table.
pub const SINC_PHASES: usize = 512;

/// Blackman window over `[-half_width, half_width]`, zero outside.
fn blackman(x: f64, half_width: f64) -> f64 {
    if x.abs() >= half_width {
        return 0.0;
    }
    let phase = PI * x / half_width;
    0.42 + 0.5 * libm::cos(phase) + 0.08 * libm::cos(2.0 * phase)
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        libm::sin(PI * x) / (PI * x)
    }
}

/// Band-limited interpolating sampler.
#[derive(Debug, Clone)]
pub struct SincSampler {
    cutoff: f64,
    table: Vec<f32>,
}

impl SincSampler {
    /// Builds the coefficient table for converting `source_rate` to `dest_rate`.
    pub fn new(source_rate: u32, dest_rate: u32) -> Self {
        let cutoff = (f64::from(dest_rate) / f64::from(source_rate)).min(1.0);
        let half_width = SINC_HALF_WIDTH as f64;
        let mut table = Vec::with_capacity((SINC_PHASES + 1) * SINC_TAPS);
        let mut row = [0.0f64; SINC_TAPS];

        for phase in 0..=SINC_PHASES {
            let frac = phase as f64 / SINC_PHASES as f64;
            for (j, coeff) in row.iter_mut().enumerate() {
                // Distance from the output position to tap j.
                let x = frac + (SINC_HALF_WIDTH - 1) as f64 - j as f64;
                *coeff = cutoff * sinc(cutoff * x) * blackman(x, half_width);
            }
            let sum: f64 = row.iter().sum();
            if sum.abs() > 1e-12 {
                for c in &mut row {
                    *c /= sum;
                }
            }
            table.extend(row.iter().map(|&c| c as f32));
        }

        Self { cutoff, table }
    }

    /// Normalized cutoff (1.0 means the source Nyquist frequency).
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Source frames needed before an output position.
    pub const fn neg_width_frames(&self) -> i64 {
        (SINC_HALF_WIDTH - 1) as i64
    }

    /// Source frames needed after an output position.
    pub const fn pos_width_frames(&self) -> i64 {
        SINC_HALF_WIDTH as i64
    }

    /// Source frames needed to render positions `first..=last`.
    pub fn span(&self, first: Fixed, last: Fixed) -> (i64, i64) {
        (
            first.floor() - self.neg_width_frames(),
            last.floor() + self.pos_width_frames(),
        )
    }

    /// Filters the frames around `rel` (relative to `window`'s first frame)
    /// into `out`.
    ///
    /// `rel` must be at least [`neg_width_frames`](Self::neg_width_frames)
    /// and the window must extend [`pos_width_frames`](Self::pos_width_frames)
    /// past it; [`span`](Self::span) guarantees both.
    #[inline]
    pub fn sample(&self, window: &[f32], channels: usize, rel: Fixed, out: &mut [f32]) {
        let base = (rel.floor() - self.neg_width_frames()).max(0) as usize;
        let phase_pos = rel.fraction().raw() as f32 * (SINC_PHASES as f32 / FRAC_ONE as f32);
        let p0 = (phase_pos as usize).min(SINC_PHASES - 1);
        let t = phase_pos - p0 as f32;
        let r0 = &self.table[p0 * SINC_TAPS..(p0 + 1) * SINC_TAPS];
        let r1 = &self.table[(p0 + 1) * SINC_TAPS..(p0 + 2) * SINC_TAPS];

        out.fill(0.0);
        for j in 0..SINC_TAPS {
            let w = r0[j] + t * (r1[j] - r0[j]);
            if w == 0.0 {
                continue;
            }
            let frame = &window[(base + j) * channels..(base + j + 1) * channels];
            for (o, &s) in out.iter_mut().zip(frame) {
                *o += s * w;
            }
        }
    }
}
