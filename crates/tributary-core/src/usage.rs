//! Stream usages.
//!
//! A usage is the routing tag a producer attaches to its stream. The output
//! pipeline sends each stream to the single mix group that lists its usage.

use core::fmt;
use core::str::FromStr;

/// Routing class of an input stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum StreamUsage {
    /// Ambient or background content.
    Background,
    /// Music, video soundtracks, games.
    Media,
    /// Alarms, notifications and other interruptions.
    Interruption,
    /// System sounds and assistant speech.
    SystemAgent,
    /// Voice and video calls.
    Communication,
}

impl StreamUsage {
    /// Every usage, in mask bit order.
    pub const ALL: [StreamUsage; 5] = [
        StreamUsage::Background,
        StreamUsage::Media,
        StreamUsage::Interruption,
        StreamUsage::SystemAgent,
        StreamUsage::Communication,
    ];

    /// Canonical kebab-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            StreamUsage::Background => "background",
            StreamUsage::Media => "media",
            StreamUsage::Interruption => "interruption",
            StreamUsage::SystemAgent => "system-agent",
            StreamUsage::Communication => "communication",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for StreamUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown usage name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stream usage: {0}")]
pub struct ParseUsageError(pub String);

impl FromStr for StreamUsage {
    type Err = ParseUsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        StreamUsage::ALL
            .into_iter()
            .find(|u| u.as_str() == normalized)
            .ok_or_else(|| ParseUsageError(s.to_string()))
    }
}

/// A set of usages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StreamUsageMask(u8);

impl StreamUsageMask {
    /// The empty set.
    pub const EMPTY: StreamUsageMask = StreamUsageMask(0);

    /// Adds a usage.
    pub fn insert(&mut self, usage: StreamUsage) {
        self.0 |= usage.bit();
    }

    /// True if `usage` is in the set.
    pub const fn contains(self, usage: StreamUsage) -> bool {
        self.0 & usage.bit() != 0
    }

    /// Set union.
    #[must_use]
    pub const fn union(self, other: StreamUsageMask) -> StreamUsageMask {
        StreamUsageMask(self.0 | other.0)
    }

    /// True if no usage is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members of the set in [`StreamUsage::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = StreamUsage> {
        StreamUsage::ALL.into_iter().filter(move |u| self.contains(*u))
    }
}

impl From<StreamUsage> for StreamUsageMask {
    fn from(usage: StreamUsage) -> Self {
        StreamUsageMask(usage.bit())
    }
}

impl FromIterator<StreamUsage> for StreamUsageMask {
    fn from_iter<I: IntoIterator<Item = StreamUsage>>(iter: I) -> Self {
        let mut mask = StreamUsageMask::EMPTY;
        for usage in iter {
            mask.insert(usage);
        }
        mask
    }
}

impl fmt::Display for StreamUsageMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(StreamUsage::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
