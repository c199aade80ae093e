//! Reference clocks.
//!
//! Every stream is timed against some [`ReferenceClock`]. Clocks are never
//! assumed to agree: each one publishes an affine mapping from its own
//! nanoseconds to the system monotonic timeline, and the mixer composes those
//! mappings to relate frames across clock domains.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tributary_core::{ClockRef, ManualClock, RefTime, ReferenceClock};
//!
//! let clock = Arc::new(ManualClock::new(RefTime::ZERO));
//! clock.advance(std::time::Duration::from_millis(10));
//! assert_eq!(clock.now(), RefTime::from_nanos(10_000_000));
//!
//! let shared: ClockRef = clock;
//! assert_eq!(shared.to_monotonic().apply(5), 5);
//! ```

use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::timeline::{TimelineFunction, TimelineRate};

/// Nanoseconds on some reference clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefTime(i64);

impl RefTime {
    /// Time zero.
    pub const ZERO: RefTime = RefTime(0);
    /// Earliest representable time.
    pub const MIN: RefTime = RefTime(i64::MIN);

    /// Wraps a nanosecond value.
    pub const fn from_nanos(nanos: i64) -> Self {
        RefTime(nanos)
    }

    /// Nanosecond value.
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Adds a duration, saturating.
    pub fn saturating_add(self, d: Duration) -> Self {
        RefTime(self.0.saturating_add(duration_nanos(d)))
    }

    /// Subtracts a duration, saturating.
    pub fn saturating_sub(self, d: Duration) -> Self {
        RefTime(self.0.saturating_sub(duration_nanos(d)))
    }
}

impl Add<Duration> for RefTime {
    type Output = RefTime;

    fn add(self, rhs: Duration) -> RefTime {
        self.saturating_add(rhs)
    }
}

impl Sub<Duration> for RefTime {
    type Output = RefTime;

    fn sub(self, rhs: Duration) -> RefTime {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for RefTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

fn duration_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Nanoseconds since the process-wide monotonic epoch.
pub fn monotonic_now() -> RefTime {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    RefTime(duration_nanos(epoch.elapsed()))
}

/// A monotonically increasing time source.
pub trait ReferenceClock: Send + Sync + fmt::Debug {
    /// Current time on this clock.
    fn now(&self) -> RefTime;

    /// Mapping from this clock's nanoseconds to system monotonic nanoseconds.
    fn to_monotonic(&self) -> TimelineFunction;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "clock"
    }
}

/// Shared handle to a reference clock.
pub type ClockRef = Arc<dyn ReferenceClock>;

/// True if both handles point at the same clock instance.
pub fn same_clock(a: &ClockRef, b: &ClockRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Translates `time` on `from` into the equivalent time on `to`.
pub fn translate_time(time: RefTime, from: &ClockRef, to: &ClockRef) -> RefTime {
    if same_clock(from, to) {
        return time;
    }
    let mono = from.to_monotonic().apply(time.as_nanos());
    let target = to.to_monotonic();
    if !target.is_invertible() {
        return time;
    }
    RefTime(target.apply_inverse(mono))
}

/// The system monotonic clock.
#[derive(Debug, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Creates a shared monotonic clock handle.
    pub fn shared() -> ClockRef {
        Arc::new(MonotonicClock)
    }
}

impl ReferenceClock for MonotonicClock {
    fn now(&self) -> RefTime {
        monotonic_now()
    }

    fn to_monotonic(&self) -> TimelineFunction {
        TimelineFunction::identity()
    }

    fn name(&self) -> &str {
        "monotonic"
    }
}

/// A clock whose rate relative to monotonic can be trimmed in
/// parts-per-million, e.g. to follow a hardware device's crystal.
pub struct AdjustableClock {
    name: String,
    clock_to_mono: ArcSwap<TimelineFunction>,
}

/// Largest accepted rate adjustment.
pub const MAX_RATE_ADJUST_PPM: i32 = 1000;

impl AdjustableClock {
    /// Creates a clock that currently reads the same as monotonic.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_offset(name, 0)
    }

    /// Creates a clock that reads `offset_ns` ahead of monotonic.
    pub fn with_offset(name: impl Into<String>, offset_ns: i64) -> Self {
        let mono = monotonic_now().as_nanos();
        Self {
            name: name.into(),
            clock_to_mono: ArcSwap::from_pointee(TimelineFunction::new(
                mono,
                mono.saturating_add(offset_ns),
                TimelineRate::IDENTITY,
            )),
        }
    }

    /// Changes the clock rate to `1 + ppm / 1_000_000` of monotonic,
    /// re-anchored at the current instant so the clock stays continuous.
    /// The adjustment is clamped to [`MAX_RATE_ADJUST_PPM`].
    pub fn adjust_ppm(&self, ppm: i32) {
        let ppm = ppm.clamp(-MAX_RATE_ADJUST_PPM, MAX_RATE_ADJUST_PPM);
        let mono = monotonic_now().as_nanos();
        let reference_delta = (1_000_000 + i64::from(ppm)) as u64;
        self.clock_to_mono.rcu(|current| {
            let clock_now = current.apply_inverse(mono);
            TimelineFunction::new(mono, clock_now, TimelineRate::new(1_000_000, reference_delta))
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(clock = %self.name, ppm, "clock_adjust");
    }
}

impl fmt::Debug for AdjustableClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdjustableClock")
            .field("name", &self.name)
            .field("clock_to_mono", &**self.clock_to_mono.load())
            .finish()
    }
}

impl ReferenceClock for AdjustableClock {
    fn now(&self) -> RefTime {
        RefTime(self.clock_to_mono.load().apply_inverse(monotonic_now().as_nanos()))
    }

    fn to_monotonic(&self) -> TimelineFunction {
        **self.clock_to_mono.load()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A clock that only moves when told to. Used for offline rendering and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
    to_mono: TimelineFunction,
}

impl ManualClock {
    /// Creates a clock in the monotonic domain starting at `start`.
    pub fn new(start: RefTime) -> Self {
        Self::with_mapping(start, TimelineFunction::identity())
    }

    /// Creates a clock with an explicit mapping to monotonic time.
    pub fn with_mapping(start: RefTime, to_mono: TimelineFunction) -> Self {
        Self {
            now: AtomicI64::new(start.as_nanos()),
            to_mono,
        }
    }

    /// Sets the current time.
    pub fn set(&self, time: RefTime) {
        self.now.store(time.as_nanos(), Ordering::Release);
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_nanos(by), Ordering::AcqRel);
    }
}

impl ReferenceClock for ManualClock {
    fn now(&self) -> RefTime {
        RefTime(self.now.load(Ordering::Acquire))
    }

    fn to_monotonic(&self) -> TimelineFunction {
        self.to_mono
    }

    fn name(&self) -> &str {
        "manual"
    }
}
