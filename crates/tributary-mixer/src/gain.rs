//! Per-input gain with linear ramps.
//!
//! An input's gain is the sum of a source gain (set by the producer) and a
//! destination gain (set by whoever owns the mix group), both in dB. Source
//! gain changes can ramp linearly in the scale domain over a number of
//! destination frames; the ramp carries across successive mix jobs.

use std::time::Duration;

/// Gains at or below this level are silent.
pub const MUTED_GAIN_DB: f32 = -160.0;
/// Gains are clamped to this ceiling.
pub const MAX_GAIN_DB: f32 = 24.0;
/// Unity gain.
pub const UNITY_GAIN_DB: f32 = 0.0;

/// Converts dB to a linear scale; anything at or below [`MUTED_GAIN_DB`] is 0.
pub fn db_to_scale(db: f32) -> f64 {
    if db <= MUTED_GAIN_DB {
        0.0
    } else {
        libm::pow(10.0, f64::from(db) / 20.0)
    }
}

/// Converts a linear scale to dB, flooring at [`MUTED_GAIN_DB`].
pub fn scale_to_db(scale: f64) -> f32 {
    if scale <= 0.0 {
        return MUTED_GAIN_DB;
    }
    ((20.0 * libm::log10(scale)) as f32).max(MUTED_GAIN_DB)
}

/// A gain change requested by a control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainUpdate {
    /// Set the source gain immediately.
    Source(f32),
    /// Ramp the source gain to `db` over `duration`.
    Ramp {
        /// Target source gain.
        db: f32,
        /// Ramp length.
        duration: Duration,
    },
    /// Set the destination gain immediately.
    Dest(f32),
    /// Mute or unmute without touching the gain values.
    Mute(bool),
}

/// Gain state for one input.
#[derive(Debug, Clone)]
pub struct Gain {
    source_db: f32,
    dest_db: f32,
    muted: bool,
    current: f64,
    target: f64,
    increment: f64,
    frames_remaining: u64,
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl Gain {
    /// Unity gain, unmuted.
    pub fn new() -> Self {
        Self {
            source_db: UNITY_GAIN_DB,
            dest_db: UNITY_GAIN_DB,
            muted: false,
            current: 1.0,
            target: 1.0,
            increment: 0.0,
            frames_remaining: 0,
        }
    }

    fn combined_scale(&self) -> f64 {
        db_to_scale((self.source_db + self.dest_db).min(MAX_GAIN_DB))
    }

    fn snap(&mut self) {
        self.target = self.combined_scale();
        self.current = self.target;
        self.increment = 0.0;
        self.frames_remaining = 0;
    }

    /// Source gain in dB.
    pub fn source_db(&self) -> f32 {
        self.source_db
    }

    /// Destination gain in dB.
    pub fn dest_db(&self) -> f32 {
        self.dest_db
    }

    /// Source plus destination gain, clamped to the valid range.
    pub fn combined_db(&self) -> f32 {
        (self.source_db + self.dest_db).clamp(MUTED_GAIN_DB, MAX_GAIN_DB)
    }

    /// Sets the source gain immediately, cancelling any ramp.
    pub fn set_source_gain(&mut self, db: f32) {
        self.source_db = db.clamp(MUTED_GAIN_DB, MAX_GAIN_DB);
        self.snap();
    }

    /// Sets the destination gain immediately, cancelling any ramp.
    pub fn set_dest_gain(&mut self, db: f32) {
        self.dest_db = db.clamp(MUTED_GAIN_DB, MAX_GAIN_DB);
        self.snap();
    }

    /// Ramps the source gain to `db` over `frames` destination frames.
    pub fn set_source_gain_with_ramp(&mut self, db: f32, frames: u64) {
        self.source_db = db.clamp(MUTED_GAIN_DB, MAX_GAIN_DB);
        if frames == 0 {
            self.snap();
            return;
        }
        self.target = self.combined_scale();
        self.increment = (self.target - self.current) / frames as f64;
        self.frames_remaining = frames;
    }

    /// Mutes or unmutes.
    pub fn set_mute(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// True when muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// True while a ramp is in progress.
    pub fn is_ramping(&self) -> bool {
        self.frames_remaining > 0
    }

    /// True when the input contributes nothing and can be skipped.
    pub fn is_silent(&self) -> bool {
        self.muted || (!self.is_ramping() && self.current == 0.0)
    }

    /// True when the input passes through at exactly unity.
    pub fn is_unity(&self) -> bool {
        !self.muted && !self.is_ramping() && self.current == 1.0
    }

    /// Current linear scale.
    pub fn scale(&self) -> f64 {
        if self.muted { 0.0 } else { self.current }
    }

    /// Advances the ramp by one frame and returns the scale for that frame.
    #[inline]
    pub fn next_scale(&mut self) -> f64 {
        if self.frames_remaining > 0 {
            self.current += self.increment;
            self.frames_remaining -= 1;
            if self.frames_remaining == 0 {
                self.current = self.target;
            }
        }
        self.scale()
    }

    /// Advances the ramp by `frames` without producing output.
    pub fn advance(&mut self, frames: u64) {
        if frames >= self.frames_remaining {
            self.current = self.target;
            self.frames_remaining = 0;
            self.increment = 0.0;
        } else {
            self.current += self.increment * frames as f64;
            self.frames_remaining -= frames;
        }
    }
}
