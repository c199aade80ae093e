//! Resampler selection.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which sampler an input uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerPolicy {
    /// Use the pipeline-wide default. If that is also `Default`, pick point
    /// sampling for matching rates and windowed sinc otherwise.
    #[default]
    Default,
    /// Nearest-frame sampling.
    Point,
    /// Band-limited windowed-sinc interpolation.
    WindowedSinc,
}

impl ResamplerPolicy {
    /// Replaces `Default` with `fallback`.
    #[must_use]
    pub fn resolve(self, fallback: ResamplerPolicy) -> ResamplerPolicy {
        match self {
            ResamplerPolicy::Default => fallback,
            other => other,
        }
    }

    /// Canonical snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ResamplerPolicy::Default => "default",
            ResamplerPolicy::Point => "point",
            ResamplerPolicy::WindowedSinc => "windowed_sinc",
        }
    }
}

impl fmt::Display for ResamplerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResamplerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Ok(ResamplerPolicy::Default),
            "point" => Ok(ResamplerPolicy::Point),
            "windowed_sinc" | "sinc" => Ok(ResamplerPolicy::WindowedSinc),
            _ => Err(format!("unknown resampler: {s}")),
        }
    }
}
