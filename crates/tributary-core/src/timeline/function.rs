//! Affine timeline functions.

use super::rate::TimelineRate;

/// An affine map between a reference timeline and a subject timeline:
///
/// `subject = (reference - reference_time) * rate + subject_time`
///
/// Reference values are usually nanoseconds on some clock; subject values are
/// nanoseconds on another clock or raw [`Fixed`](crate::Fixed) frame positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct TimelineFunction {
    subject_time: i64,
    reference_time: i64,
    rate: TimelineRate,
}

impl TimelineFunction {
    /// Creates a function anchored at `(reference_time, subject_time)`.
    pub const fn new(subject_time: i64, reference_time: i64, rate: TimelineRate) -> Self {
        Self {
            subject_time,
            reference_time,
            rate,
        }
    }

    /// The identity function.
    pub const fn identity() -> Self {
        Self::new(0, 0, TimelineRate::IDENTITY)
    }

    /// Subject value at the anchor point.
    pub const fn subject_time(&self) -> i64 {
        self.subject_time
    }

    /// Reference value at the anchor point.
    pub const fn reference_time(&self) -> i64 {
        self.reference_time
    }

    /// Slope of the function.
    pub const fn rate(&self) -> TimelineRate {
        self.rate
    }

    /// True when the function can be inverted.
    pub const fn is_invertible(&self) -> bool {
        self.rate.is_invertible()
    }

    /// Maps a reference value to a subject value.
    pub fn apply(&self, reference: i64) -> i64 {
        self.rate
            .scale(reference.saturating_sub(self.reference_time))
            .saturating_add(self.subject_time)
    }

    /// Maps a subject value back to a reference value.
    ///
    /// # Panics
    ///
    /// Panics if the rate is zero.
    pub fn apply_inverse(&self, subject: i64) -> i64 {
        self.rate
            .inverse()
            .scale(subject.saturating_sub(self.subject_time))
            .saturating_add(self.reference_time)
    }

    /// The inverse function (subject to reference).
    ///
    /// # Panics
    ///
    /// Panics if the rate is zero.
    pub const fn inverse(&self) -> Self {
        Self::new(self.reference_time, self.subject_time, self.rate.inverse())
    }

    /// Composes `bc ∘ ab`: the returned function maps `ab`'s reference
    /// timeline to `bc`'s subject timeline.
    pub fn compose(bc: &TimelineFunction, ab: &TimelineFunction) -> Self {
        Self::new(
            bc.apply(ab.subject_time),
            ab.reference_time,
            TimelineRate::product(ab.rate, bc.rate),
        )
    }

    /// Scales the subject side by `scale`, e.g. to re-express a frame
    /// timeline at another frame rate.
    pub fn scale_subject(&self, scale: TimelineRate) -> Self {
        Self::new(
            scale.scale(self.subject_time),
            self.reference_time,
            TimelineRate::product(self.rate, scale),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FRAC_ONE;

    fn frames_at(rate: u64) -> TimelineFunction {
        TimelineFunction::new(0, 0, TimelineRate::new(rate * FRAC_ONE as u64, 1_000_000_000))
    }

    #[test]
    fn apply_and_inverse() {
        let f = TimelineFunction::new(100, 10, TimelineRate::new(2, 1));
        assert_eq!(f.apply(10), 100);
        assert_eq!(f.apply(15), 110);
        assert_eq!(f.apply_inverse(110), 15);
        assert_eq!(f.inverse().apply(110), 15);
    }

    #[test]
    fn one_second_at_48k_is_48000_frames() {
        let f = frames_at(48000);
        assert_eq!(f.apply(1_000_000_000), 48000 * FRAC_ONE);
    }

    #[test]
    fn compose_matches_sequential_application() {
        let ab = TimelineFunction::new(5_000, 1_000, TimelineRate::new(1_000_050, 1_000_000));
        let bc = frames_at(44100);
        let ac = TimelineFunction::compose(&bc, &ab);
        for t in [1_000i64, 20_833, 1_000_000, 987_654_321] {
            let sequential = bc.apply(ab.apply(t));
            assert!((ac.apply(t) - sequential).abs() <= 1, "t={t}");
        }
    }

    #[test]
    fn frame_to_frame_mapping_between_rates() {
        let dest = frames_at(48000);
        let src = frames_at(44100);
        let f = TimelineFunction::compose(&src, &dest.inverse());
        assert_eq!(f.rate(), TimelineRate::new(147, 160));
        assert_eq!(f.apply(160 * FRAC_ONE), 147 * FRAC_ONE);
    }

    #[test]
    fn scale_subject_changes_frame_rate() {
        let root = frames_at(48000);
        let child = root.scale_subject(TimelineRate::new(96000, 48000));
        assert_eq!(child.apply(1_000_000_000), 96000 * FRAC_ONE);
    }

    #[test]
    fn paused_function_is_not_invertible() {
        let f = TimelineFunction::new(42, 0, TimelineRate::ZERO);
        assert!(!f.is_invertible());
        assert_eq!(f.apply(1_000_000), 42);
    }
}
