//! Topology validation.
//!
//! Every structural problem is caught here, before a pipeline is built:
//! the graph must be a tree rooted at `root`, each usage must route to
//! exactly one group, and effect chains must be constructible.
//!
//! # Example
//!
//! ```rust
//! use tributary_config::{MixGroupConfig, PipelineConfig, ValidationError};
//!
//! let config = PipelineConfig::new("out")
//!     .with_group(MixGroupConfig::new("out").with_input("missing"));
//! assert_eq!(
//!     config.validate(),
//!     Err(ValidationError::UnknownChild {
//!         group: "out".into(),
//!         child: "missing".into(),
//!     })
//! );
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tributary_core::{FormatError, SampleFormat, StreamUsage};
use tributary_effects::{EffectError, EffectParams, EffectRegistry};

use crate::topology::PipelineConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The topology declares no groups.
    #[error("topology has no mix groups")]
    NoGroups,

    /// `root` does not name a group.
    #[error("root group '{0}' is not defined")]
    UnknownRoot(String),

    /// Two groups share a name.
    #[error("group '{0}' is defined more than once")]
    DuplicateGroup(String),

    /// A group lists an input that is not a group.
    #[error("group '{group}' lists unknown input '{child}'")]
    UnknownChild {
        /// The referencing group.
        group: String,
        /// The missing child.
        child: String,
    },

    /// A group is listed as an input more than once.
    #[error("group '{0}' is an input of more than one parent")]
    MultipleParents(String),

    /// Groups nest into a cycle.
    #[error("group '{0}' is part of a nesting cycle")]
    Cycle(String),

    /// A group is not reachable from the root.
    #[error("group '{0}' is not reachable from the root")]
    Unreachable(String),

    /// A usage routes to more than one group.
    #[error("usage '{usage}' is routed to both '{first}' and '{second}'")]
    DuplicateUsage {
        /// The usage.
        usage: StreamUsage,
        /// First group listing it.
        first: String,
        /// Second group listing it.
        second: String,
    },

    /// Two effects share an instance name.
    #[error("effect instance '{0}' is defined more than once")]
    DuplicateInstance(String),

    /// More than one group is tapped for loopback.
    #[error("both '{first}' and '{second}' are marked loopback")]
    MultipleLoopbacks {
        /// First loopback group.
        first: String,
        /// Second loopback group.
        second: String,
    },

    /// A group's format fields are out of range.
    #[error("group '{group}' has an invalid format: {source}")]
    InvalidFormat {
        /// The group.
        group: String,
        /// What is wrong with it.
        #[source]
        source: FormatError,
    },

    /// Effects are declared on a group whose output is not float.
    #[error("group '{group}' declares effects but produces {sample_format}")]
    EffectsRequireFloat {
        /// The group.
        group: String,
        /// Its sample format.
        sample_format: SampleFormat,
    },

    /// The block size is zero.
    #[error("block_size_frames must be at least 1")]
    ZeroBlockSize,

    /// An effect cannot be created as declared.
    #[error("effect instance '{instance}': {source}")]
    Effect {
        /// Instance name.
        instance: String,
        /// The registry's reason.
        #[source]
        source: EffectError,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn collapse(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

impl PipelineConfig {
    /// Check the topology's structure.
    ///
    /// Effect types are not checked; use [`validate_with_registry`] for that.
    ///
    /// [`validate_with_registry`]: PipelineConfig::validate_with_registry
    pub fn validate(&self) -> ValidationResult<()> {
        collapse(self.structural_errors())
    }

    /// Check the topology's structure and that every effect can be created.
    pub fn validate_with_registry(&self, registry: &EffectRegistry) -> ValidationResult<()> {
        let mut errors = self.structural_errors();
        errors.extend(self.effect_errors(registry));
        collapse(errors)
    }

    /// Every problem found, in a stable order.
    pub fn validation_errors(&self, registry: &EffectRegistry) -> Vec<ValidationError> {
        let mut errors = self.structural_errors();
        errors.extend(self.effect_errors(registry));
        errors
    }

    fn structural_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.block_size_frames == 0 {
            errors.push(ValidationError::ZeroBlockSize);
        }
        if self.groups.is_empty() {
            errors.push(ValidationError::NoGroups);
            return errors;
        }

        let mut names = HashSet::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                errors.push(ValidationError::DuplicateGroup(group.name.clone()));
            }
        }
        if !names.contains(self.root.as_str()) {
            errors.push(ValidationError::UnknownRoot(self.root.clone()));
        }

        self.check_links(&names, &mut errors);
        self.check_routing(&mut errors);

        for group in &self.groups {
            match group.format() {
                Err(source) => errors.push(ValidationError::InvalidFormat {
                    group: group.name.clone(),
                    source,
                }),
                Ok(format)
                    if !group.effects.is_empty()
                        && format.sample_format() != SampleFormat::Float =>
                {
                    errors.push(ValidationError::EffectsRequireFloat {
                        group: group.name.clone(),
                        sample_format: format.sample_format(),
                    });
                }
                Ok(_) => {}
            }
        }

        errors
    }

    /// Parent/child structure: known children, one parent each, no cycles,
    /// everything reachable from the root.
    fn check_links(&self, names: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
        let mut parent_count: HashMap<&str, usize> = HashMap::new();
        for group in &self.groups {
            for child in &group.inputs {
                if names.contains(child.as_str()) {
                    *parent_count.entry(child.as_str()).or_default() += 1;
                } else {
                    errors.push(ValidationError::UnknownChild {
                        group: group.name.clone(),
                        child: child.clone(),
                    });
                }
            }
        }
        let mut multi: Vec<_> = parent_count
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(name, _)| *name)
            .collect();
        multi.sort_unstable();
        errors.extend(
            multi
                .into_iter()
                .map(|name| ValidationError::MultipleParents(name.to_string())),
        );

        let mut cyclic = HashSet::new();
        for group in &self.groups {
            if self.on_cycle(&group.name) {
                cyclic.insert(group.name.as_str());
                errors.push(ValidationError::Cycle(group.name.clone()));
            }
        }

        let mut reachable = HashSet::new();
        let mut stack = vec![self.root.as_str()];
        while let Some(name) = stack.pop() {
            if !reachable.insert(name) {
                continue;
            }
            if let Some(group) = self.group(name) {
                stack.extend(group.inputs.iter().map(String::as_str));
            }
        }
        let mut seen = HashSet::new();
        for group in &self.groups {
            let name = group.name.as_str();
            if names.contains(self.root.as_str())
                && !reachable.contains(name)
                && !cyclic.contains(name)
                && seen.insert(name)
            {
                errors.push(ValidationError::Unreachable(group.name.clone()));
            }
        }
    }

    /// Whether `start` can reach itself through child links.
    fn on_cycle(&self, start: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<&str> = self
            .group(start)
            .map(|g| g.inputs.iter().map(String::as_str).collect())
            .unwrap_or_default();
        while let Some(name) = stack.pop() {
            if name == start {
                return true;
            }
            if visited.insert(name)
                && let Some(group) = self.group(name)
            {
                stack.extend(group.inputs.iter().map(String::as_str));
            }
        }
        false
    }

    fn check_routing(&self, errors: &mut Vec<ValidationError>) {
        let mut usage_owner: HashMap<StreamUsage, &str> = HashMap::new();
        let mut instances = HashSet::new();
        let mut loopback: Option<&str> = None;

        for group in &self.groups {
            for &usage in &group.usages {
                if let Some(first) = usage_owner.insert(usage, &group.name) {
                    errors.push(ValidationError::DuplicateUsage {
                        usage,
                        first: first.to_string(),
                        second: group.name.clone(),
                    });
                }
            }
            for effect in &group.effects {
                if !instances.insert(effect.instance.as_str()) {
                    errors.push(ValidationError::DuplicateInstance(effect.instance.clone()));
                }
            }
            if group.loopback {
                match loopback {
                    Some(first) => errors.push(ValidationError::MultipleLoopbacks {
                        first: first.to_string(),
                        second: group.name.clone(),
                    }),
                    None => loopback = Some(&group.name),
                }
            }
        }
    }

    fn effect_errors(&self, registry: &EffectRegistry) -> Vec<ValidationError> {
        self.effect_instances()
            .filter_map(|(group, effect)| {
                let params = EffectParams::new(group.frame_rate, group.channels)
                    .with_config(effect.config.clone());
                registry
                    .create(&effect.effect_type, &params)
                    .err()
                    .map(|source| ValidationError::Effect {
                        instance: effect.instance.clone(),
                        source,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{EffectSpec, MixGroupConfig};

    fn tree() -> PipelineConfig {
        PipelineConfig::new("out")
            .with_group(
                MixGroupConfig::new("out")
                    .with_usage(StreamUsage::Background)
                    .with_input("media")
                    .with_input("voice"),
            )
            .with_group(MixGroupConfig::new("media").with_usage(StreamUsage::Media))
            .with_group(
                MixGroupConfig::new("voice")
                    .with_usage(StreamUsage::Communication)
                    .with_effect(EffectSpec::new("gain", "voice_gain").with_config("-6dB")),
            )
    }

    #[test]
    fn valid_tree_passes() {
        assert_eq!(tree().validate(), Ok(()));
        assert_eq!(tree().validate_with_registry(&EffectRegistry::new()), Ok(()));
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn no_groups() {
        assert_eq!(
            PipelineConfig::new("out").validate(),
            Err(ValidationError::NoGroups)
        );
    }

    #[test]
    fn unknown_root() {
        let mut config = tree();
        config.root = "main".into();
        assert_eq!(
            config.validate(),
            Err(ValidationError::UnknownRoot("main".into()))
        );
    }

    #[test]
    fn duplicate_group() {
        let config = tree().with_group(MixGroupConfig::new("media"));
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateGroup("media".into()))
        );
    }

    #[test]
    fn child_with_two_parents() {
        let mut config = tree();
        config.groups[1].inputs.push("voice".into());
        assert_eq!(
            config.validate(),
            Err(ValidationError::MultipleParents("voice".into()))
        );
    }

    #[test]
    fn cycle_detected() {
        let config = tree()
            .with_group(MixGroupConfig::new("a").with_input("b"))
            .with_group(MixGroupConfig::new("b").with_input("a"));
        let Err(ValidationError::Multiple(errors)) = config.validate() else {
            panic!("expected several errors");
        };
        assert_eq!(
            errors,
            vec![
                ValidationError::Cycle("a".into()),
                ValidationError::Cycle("b".into()),
            ]
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut config = tree();
        config.groups[0].inputs.push("out".into());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Cycle(name)) if name == "out"
        ));
    }

    #[test]
    fn unreachable_group() {
        let config = tree().with_group(MixGroupConfig::new("orphan"));
        assert_eq!(
            config.validate(),
            Err(ValidationError::Unreachable("orphan".into()))
        );
    }

    #[test]
    fn usage_routed_twice() {
        let mut config = tree();
        config.groups[2].usages.push(StreamUsage::Media);
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateUsage {
                usage: StreamUsage::Media,
                first: "media".into(),
                second: "voice".into(),
            })
        );
    }

    #[test]
    fn duplicate_instance() {
        let mut config = tree();
        config.groups[0]
            .effects
            .push(EffectSpec::new("passthrough", "voice_gain"));
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateInstance("voice_gain".into()))
        );
    }

    #[test]
    fn two_loopbacks() {
        let mut config = tree();
        config.groups[0].loopback = true;
        config.groups[1].loopback = true;
        assert_eq!(
            config.validate(),
            Err(ValidationError::MultipleLoopbacks {
                first: "out".into(),
                second: "media".into(),
            })
        );
    }

    #[test]
    fn bad_format_and_effects_on_integer_group() {
        let mut config = tree();
        config.groups[1].frame_rate = 500;
        config.groups[2].sample_format = SampleFormat::Signed16;
        assert_eq!(
            config.validate(),
            Err(ValidationError::Multiple(vec![
                ValidationError::InvalidFormat {
                    group: "media".into(),
                    source: FormatError::InvalidFrameRate(500),
                },
                ValidationError::EffectsRequireFloat {
                    group: "voice".into(),
                    sample_format: SampleFormat::Signed16,
                },
            ]))
        );
    }

    #[test]
    fn zero_block_size() {
        assert_eq!(
            tree().with_block_size(0).validate(),
            Err(ValidationError::ZeroBlockSize)
        );
    }

    #[test]
    fn registry_catches_unknown_types_and_bad_configs() {
        let mut config = tree();
        config.groups[0]
            .effects
            .push(EffectSpec::new("reverb", "room"));
        config.groups[1]
            .effects
            .push(EffectSpec::new("gain", "media_gain").with_config("loud"));

        assert_eq!(config.validate(), Ok(()));
        let errors = config.validation_errors(&EffectRegistry::new());
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0],
            ValidationError::Effect {
                instance: "room".into(),
                source: EffectError::UnknownEffectType("reverb".into()),
            }
        );
        assert!(matches!(
            &errors[1],
            ValidationError::Effect { instance, source: EffectError::InvalidConfig { .. } }
                if instance == "media_gain"
        ));
    }

    #[test]
    fn multiple_display_joins_messages() {
        let err = ValidationError::Multiple(vec![
            ValidationError::NoGroups,
            ValidationError::ZeroBlockSize,
        ]);
        assert_eq!(
            err.to_string(),
            "multiple validation errors: topology has no mix groups; block_size_frames must be at least 1"
        );
    }
}
