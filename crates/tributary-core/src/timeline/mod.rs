//! Timeline model: rational rates, affine functions and versioned snapshots.
//!
//! Timing in the mix graph is expressed as chains of affine
//! [`TimelineFunction`]s. A stream publishes "reference clock nanoseconds to
//! fractional frames" through a [`VersionedTimelineFunction`]; clocks publish
//! "clock nanoseconds to system monotonic nanoseconds". Converting a
//! destination frame to a source frame is a composition of four such
//! functions, evaluated in 128-bit intermediates with floor rounding.

mod function;
mod rate;
mod versioned;

pub use function::TimelineFunction;
pub use rate::TimelineRate;
pub use versioned::{TimelineHandle, TimelineSnapshot, VersionedTimelineFunction};
