//! Atomically published timeline functions.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::function::TimelineFunction;
use super::rate::TimelineRate;

/// An immutable view of a [`VersionedTimelineFunction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelineSnapshot {
    /// Reference time (ns) to fractional frame mapping.
    pub function: TimelineFunction,
    /// Incremented on every update.
    pub generation: u64,
}

impl TimelineSnapshot {
    /// Creates a snapshot with an explicit generation.
    pub const fn new(function: TimelineFunction, generation: u64) -> Self {
        Self {
            function,
            generation,
        }
    }
}

/// A timeline function shared between one writer and many readers.
///
/// Readers call [`get`](Self::get) once per pull and work from the copy.
/// Every [`update`](Self::update) publishes a new snapshot with a larger
/// generation, so a reader that sees two different generations during one
/// operation knows it raced with a writer.
pub struct VersionedTimelineFunction {
    current: ArcSwap<TimelineSnapshot>,
}

impl VersionedTimelineFunction {
    /// Creates a versioned function at generation 1.
    pub fn new(function: TimelineFunction) -> Self {
        Self {
            current: ArcSwap::from_pointee(TimelineSnapshot::new(function, 1)),
        }
    }

    /// Returns the current snapshot.
    #[inline]
    pub fn get(&self) -> TimelineSnapshot {
        **self.current.load()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Publishes a new function and returns its generation.
    pub fn update(&self, function: TimelineFunction) -> u64 {
        let previous = self.current.rcu(|old| TimelineSnapshot::new(function, old.generation + 1));
        previous.generation + 1
    }
}

impl fmt::Debug for VersionedTimelineFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.get();
        f.debug_struct("VersionedTimelineFunction")
            .field("function", &snapshot.function)
            .field("generation", &snapshot.generation)
            .finish()
    }
}

/// A [`VersionedTimelineFunction`] viewed at a different frame rate.
///
/// Mix groups running at a rate other than the pipeline root share the root's
/// timeline through a handle whose subject side is scaled by
/// `group_rate / root_rate`. The generation is the base generation, so an
/// update to the root is visible to every derived view.
#[derive(Clone, Debug)]
pub struct TimelineHandle {
    base: Arc<VersionedTimelineFunction>,
    scale: TimelineRate,
}

impl TimelineHandle {
    /// Unscaled view of `base`.
    pub fn new(base: Arc<VersionedTimelineFunction>) -> Self {
        Self {
            base,
            scale: TimelineRate::IDENTITY,
        }
    }

    /// View of `base` with its subject side multiplied by `scale`.
    pub fn scaled(base: Arc<VersionedTimelineFunction>, scale: TimelineRate) -> Self {
        Self { base, scale }
    }

    /// The shared base function.
    pub fn base(&self) -> &Arc<VersionedTimelineFunction> {
        &self.base
    }

    /// Current snapshot, scaled.
    pub fn snapshot(&self) -> TimelineSnapshot {
        let snapshot = self.base.get();
        if self.scale == TimelineRate::IDENTITY {
            return snapshot;
        }
        TimelineSnapshot::new(
            snapshot.function.scale_subject(self.scale),
            snapshot.generation,
        )
    }
}
