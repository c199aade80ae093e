//! Property-based tests for tributary-core timing and codecs.
//!
//! Timeline functions must be monotonic and invertible to within rounding,
//! composition must agree with sequential application, and every sample
//! encoder must saturate instead of wrapping.

use proptest::prelude::*;
use tributary_core::{
    AudioData, FRAC_ONE, Fixed, SampleFormat, TimelineFunction, TimelineRate,
};

fn rate() -> impl Strategy<Value = TimelineRate> {
    (1u64..1_000_000, 1u64..1_000_000).prop_map(|(s, r)| TimelineRate::new(s, r))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// apply() never decreases as the reference value grows.
    #[test]
    fn timeline_apply_is_monotonic(
        r in rate(),
        subject in -1_000_000_000i64..1_000_000_000,
        reference in -1_000_000_000i64..1_000_000_000,
        a in -10_000_000_000i64..10_000_000_000,
        delta in 0i64..1_000_000_000,
    ) {
        let f = TimelineFunction::new(subject, reference, r);
        prop_assert!(f.apply(a) <= f.apply(a + delta));
    }

    /// apply_inverse(apply(x)) lands within one reference step of x.
    #[test]
    fn timeline_inverse_round_trip(
        r in rate(),
        x in -10_000_000_000i64..10_000_000_000,
    ) {
        let f = TimelineFunction::new(123, -456, r);
        let back = f.apply_inverse(f.apply(x));
        let step = (r.reference_delta() / r.subject_delta()).max(1) as i64 + 1;
        prop_assert!((back - x).abs() <= step, "x={} back={} rate={}", x, back, r);
    }

    /// Composition agrees with applying both functions in turn.
    #[test]
    fn timeline_compose_matches_sequential(
        r1 in rate(),
        r2 in rate(),
        x in -1_000_000_000i64..1_000_000_000,
    ) {
        let ab = TimelineFunction::new(1_000, 0, r1);
        let bc = TimelineFunction::new(-7, 50, r2);
        let ac = TimelineFunction::compose(&bc, &ab);
        let sequential = bc.apply(ab.apply(x));
        // Two floors versus one: off by at most ceil(rate(bc)) + 1.
        let slack = (r2.subject_delta() / r2.reference_delta()) as i64 + 2;
        prop_assert!((ac.apply(x) - sequential).abs() <= slack);
    }

    /// floor <= position <= ceil, and they differ by at most one frame.
    #[test]
    fn fixed_floor_ceil_bracket(raw in i64::MIN / 2..i64::MAX / 2) {
        let f = Fixed::from_raw(raw);
        prop_assert!(f.floor() * FRAC_ONE <= raw);
        prop_assert!(f.ceil() * FRAC_ONE >= raw);
        prop_assert!(f.ceil() - f.floor() <= 1);
    }

    /// Encoding any finite value stays inside the representation's range and
    /// decodes back inside [-1, 1].
    #[test]
    fn encoders_saturate(x in -4.0f64..4.0) {
        for format in SampleFormat::ALL {
            let data = AudioData::from_normalized(format, [x]);
            let back = data.normalized(0);
            prop_assert!((-1.0..=1.0).contains(&back), "{} -> {} in {}", x, back, format);
            if (-0.99..=0.99).contains(&x) {
                prop_assert!((f64::from(back) - x).abs() < 0.01);
            }
        }
    }
}
