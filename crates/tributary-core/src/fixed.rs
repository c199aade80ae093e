//! Fixed-point frame positions.
//!
//! Every frame position in the mix graph is a signed 64-bit fixed-point number
//! with [`FRAC_BITS`] fractional bits. Integral frame counts convert losslessly;
//! fractional positions arise when a source is resampled or clock-corrected.
//!
//! # Example
//!
//! ```rust
//! use tributary_core::Fixed;
//!
//! let pos = Fixed::from_frames(10) + Fixed::HALF;
//! assert_eq!(pos.floor(), 10);
//! assert_eq!(pos.ceil(), 11);
//! assert_eq!(pos.round(), 11);
//! ```

use core::fmt;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of fractional bits in a [`Fixed`] frame position.
pub const FRAC_BITS: u32 = 13;

/// Raw value of one whole frame.
pub const FRAC_ONE: i64 = 1 << FRAC_BITS;

const FRAC_MASK: i64 = FRAC_ONE - 1;

/// A frame position with 13 fractional bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i64);

impl Fixed {
    /// Position zero.
    pub const ZERO: Fixed = Fixed(0);
    /// One whole frame.
    pub const ONE: Fixed = Fixed(FRAC_ONE);
    /// Half a frame.
    pub const HALF: Fixed = Fixed(FRAC_ONE / 2);
    /// Largest representable position.
    pub const MAX: Fixed = Fixed(i64::MAX);
    /// Smallest representable position.
    pub const MIN: Fixed = Fixed(i64::MIN);

    /// Wraps a raw fixed-point value.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Fixed(raw)
    }

    /// Returns the raw fixed-point value.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Converts an integral frame count, saturating at the representable range.
    #[inline]
    pub const fn from_frames(frames: i64) -> Self {
        Fixed(frames.saturating_mul(FRAC_ONE))
    }

    /// Largest integral frame not greater than this position.
    #[inline]
    pub const fn floor(self) -> i64 {
        self.0 >> FRAC_BITS
    }

    /// Smallest integral frame not less than this position.
    #[inline]
    pub const fn ceil(self) -> i64 {
        self.0.saturating_add(FRAC_MASK) >> FRAC_BITS
    }

    /// Nearest integral frame, rounding half up.
    #[inline]
    pub const fn round(self) -> i64 {
        self.0.saturating_add(FRAC_ONE / 2) >> FRAC_BITS
    }

    /// Fractional part in `[0, 1)`.
    #[inline]
    pub const fn fraction(self) -> Fixed {
        Fixed(self.0 & FRAC_MASK)
    }

    /// True when the position lies exactly on a frame boundary.
    #[inline]
    pub const fn is_integral(self) -> bool {
        self.0 & FRAC_MASK == 0
    }

    /// Saturating addition.
    #[inline]
    pub const fn saturating_add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    pub const fn saturating_sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }

    /// Position as a floating-point frame count.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FRAC_ONE as f64
    }

    /// Nearest fixed-point position to a floating-point frame count.
    pub fn from_f64(frames: f64) -> Self {
        Fixed(libm::round(frames * FRAC_ONE as f64) as i64)
    }
}

impl Add for Fixed {
    type Output = Fixed;

    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Fixed) {
        self.0 -= rhs.0;
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    #[inline]
    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({}+{}/{})", self.floor(), self.fraction().0, FRAC_ONE)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integral() {
            write!(f, "{}", self.floor())
        } else {
            write!(f, "{}+{}/{}", self.floor(), self.fraction().0, FRAC_ONE)
        }
    }
}
