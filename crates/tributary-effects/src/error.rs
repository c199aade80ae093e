//! Error types for effect creation and reconfiguration.

use thiserror::Error;

/// Errors raised while creating or configuring an effect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// No effect is registered under this type name.
    #[error("unknown effect type: {0}")]
    UnknownEffectType(String),

    /// The configuration payload was rejected.
    #[error("invalid configuration '{config}' for effect '{effect}': {reason}")]
    InvalidConfig {
        /// Effect type name.
        effect: String,
        /// The rejected payload.
        config: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The effect cannot run with this channel count.
    #[error("effect '{effect}' does not support {channels} channels")]
    UnsupportedChannels {
        /// Effect type name.
        effect: String,
        /// Requested channel count.
        channels: u32,
    },
}

impl EffectError {
    /// Create an invalid configuration error.
    pub fn invalid_config(
        effect: impl Into<String>,
        config: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EffectError::InvalidConfig {
            effect: effect.into(),
            config: config.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a runtime effect update.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateEffectError {
    /// No effects stage owns an instance with this name.
    #[error("no effect instance named '{0}'")]
    UnknownInstance(String),

    /// The instance rejected the new configuration and kept the old one.
    #[error("effect instance '{instance}' rejected configuration: {source}")]
    RejectedConfig {
        /// Instance name.
        instance: String,
        /// The effect's reason.
        #[source]
        source: EffectError,
    },
}
