//! Tributary Config - declarative mix graph topology
//!
//! A [`PipelineConfig`] names the mix groups of an output pipeline, how they
//! nest, which usages each one accepts, the effects each one runs and which
//! one is tapped for loopback. Topologies are plain serde types, usually
//! loaded from TOML, and are checked with [`PipelineConfig::validate`]
//! before a pipeline is built from them.
//!
//! # Example
//!
//! ```rust
//! use tributary_config::{EffectSpec, MixGroupConfig, PipelineConfig};
//! use tributary_core::StreamUsage;
//!
//! let config = PipelineConfig::new("output")
//!     .with_group(
//!         MixGroupConfig::new("output")
//!             .with_usage(StreamUsage::Media)
//!             .with_input("voice")
//!             .with_loopback(true),
//!     )
//!     .with_group(
//!         MixGroupConfig::new("voice")
//!             .with_usage(StreamUsage::Communication)
//!             .with_effect(EffectSpec::new("gain", "voice_gain").with_config("-6dB")),
//!     );
//!
//! config.validate().unwrap();
//! let toml = config.to_toml().unwrap();
//! assert!(toml.contains("voice_gain"));
//! ```

pub mod error;
pub mod topology;
pub mod validation;

pub use error::ConfigError;
pub use topology::{
    DEFAULT_BLOCK_SIZE_FRAMES, DEFAULT_CHANNELS, DEFAULT_FRAME_RATE, EffectSpec, MixGroupConfig,
    PipelineConfig,
};
pub use validation::{ValidationError, ValidationResult};
