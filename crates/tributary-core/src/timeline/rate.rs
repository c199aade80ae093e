//! Reduced rational rates.

use core::fmt;

/// A non-negative rational rate `subject_delta / reference_delta`, always
/// stored in lowest terms.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineRate {
    subject_delta: u64,
    reference_delta: u64,
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl TimelineRate {
    /// The zero rate (a paused timeline).
    pub const ZERO: TimelineRate = TimelineRate {
        subject_delta: 0,
        reference_delta: 1,
    };

    /// The unit rate.
    pub const IDENTITY: TimelineRate = TimelineRate {
        subject_delta: 1,
        reference_delta: 1,
    };

    /// Nanoseconds per second.
    pub const NS_PER_SECOND: TimelineRate = TimelineRate {
        subject_delta: 1_000_000_000,
        reference_delta: 1,
    };

    /// Creates a rate and reduces it to lowest terms.
    ///
    /// # Panics
    ///
    /// Panics if `reference_delta` is zero.
    pub const fn new(subject_delta: u64, reference_delta: u64) -> Self {
        assert!(reference_delta != 0, "timeline rate with zero reference delta");
        if subject_delta == 0 {
            return Self::ZERO;
        }
        let g = gcd(subject_delta, reference_delta);
        TimelineRate {
            subject_delta: subject_delta / g,
            reference_delta: reference_delta / g,
        }
    }

    /// Numerator.
    pub const fn subject_delta(self) -> u64 {
        self.subject_delta
    }

    /// Denominator.
    pub const fn reference_delta(self) -> u64 {
        self.reference_delta
    }

    /// True when the rate can be inverted (non-zero numerator).
    pub const fn is_invertible(self) -> bool {
        self.subject_delta != 0
    }

    /// The reciprocal rate.
    ///
    /// # Panics
    ///
    /// Panics if the rate is zero.
    pub const fn inverse(self) -> Self {
        assert!(self.subject_delta != 0, "inverse of a zero timeline rate");
        TimelineRate {
            subject_delta: self.reference_delta,
            reference_delta: self.subject_delta,
        }
    }

    /// Scales `value` by this rate, rounding toward negative infinity and
    /// saturating at the `i64` range.
    pub fn scale(self, value: i64) -> i64 {
        let product = i128::from(value) * i128::from(self.subject_delta);
        let scaled = product.div_euclid(i128::from(self.reference_delta));
        i64::try_from(scaled).unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX })
    }

    /// Product of two rates.
    ///
    /// Cross-reduces before multiplying. If the exact result still does not
    /// fit in 64 bits, both terms are shifted right together, which keeps the
    /// ratio to within one part in 2^32.
    pub fn product(a: TimelineRate, b: TimelineRate) -> TimelineRate {
        if a.subject_delta == 0 || b.subject_delta == 0 {
            return Self::ZERO;
        }
        let g1 = gcd(a.subject_delta, b.reference_delta);
        let g2 = gcd(b.subject_delta, a.reference_delta);
        let mut subject =
            u128::from(a.subject_delta / g1) * u128::from(b.subject_delta / g2);
        let mut reference =
            u128::from(a.reference_delta / g2) * u128::from(b.reference_delta / g1);

        while subject > u128::from(u64::MAX) || reference > u128::from(u64::MAX) {
            subject >>= 1;
            reference >>= 1;
        }
        // Shifting can collapse either term; keep the rate well-formed.
        let subject = subject.max(1) as u64;
        let reference = reference.max(1) as u64;
        TimelineRate::new(subject, reference)
    }

    /// Floating-point approximation of the rate.
    pub fn as_f64(self) -> f64 {
        self.subject_delta as f64 / self.reference_delta as f64
    }
}

impl Default for TimelineRate {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for TimelineRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject_delta, self.reference_delta)
    }
}

impl fmt::Display for TimelineRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject_delta, self.reference_delta)
    }
}
