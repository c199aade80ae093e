//! Error types for building and driving the mix graph.

use thiserror::Error;
use tributary_config::ValidationError;
use tributary_core::{FormatError, SampleFormat, StreamUsage};
use tributary_effects::EffectError;

/// Errors raised by pipeline construction and topology mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The topology failed validation.
    #[error("invalid topology: {0}")]
    Config(#[from] ValidationError),

    /// A stage format is out of range.
    #[error("invalid format: {0}")]
    Format(#[from] FormatError),

    /// An effect instance could not be created.
    #[error("failed to create effect instance '{instance}': {source}")]
    Effect {
        /// Instance name.
        instance: String,
        /// The registry's reason.
        #[source]
        source: EffectError,
    },

    /// Effects were placed over a stage that does not produce float.
    #[error("effects stage '{stage}' needs float input, got {sample_format}")]
    EffectsRequireFloat {
        /// Stage name.
        stage: String,
        /// The child's sample format.
        sample_format: SampleFormat,
    },

    /// No mix group accepts this usage.
    #[error("no mix group accepts usage '{0}'")]
    UnroutableUsage(StreamUsage),

    /// The stream is already an input somewhere in the graph.
    #[error("stream '{0}' is already attached")]
    AlreadyAttached(String),

    /// The stream is not an input of this stage or pipeline.
    #[error("stream '{0}' is not attached")]
    NotAttached(String),
}

impl PipelineError {
    /// Create an effect creation error.
    pub fn effect(instance: impl Into<String>, source: EffectError) -> Self {
        PipelineError::Effect {
            instance: instance.into(),
            source,
        }
    }
}
