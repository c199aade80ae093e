//! Mix graph topology types.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tributary_core::{Format, FormatError, SampleFormat, StreamUsage};
use tributary_mixer::ResamplerPolicy;

use crate::error::ConfigError;

/// Default maximum frames produced per pull.
pub const DEFAULT_BLOCK_SIZE_FRAMES: u32 = 240;
/// Default mix group frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 48_000;
/// Default mix group channel count.
pub const DEFAULT_CHANNELS: u32 = 2;

/// One effect instance in a group's chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectSpec {
    /// Registered effect type, e.g. `"gain"`.
    #[serde(rename = "type")]
    pub effect_type: String,

    /// Instance name, unique across the whole topology.
    pub instance: String,

    /// Initial configuration payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config: String,
}

impl EffectSpec {
    /// Create an effect spec with an empty configuration.
    pub fn new(effect_type: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            effect_type: effect_type.into(),
            instance: instance.into(),
            config: String::new(),
        }
    }

    /// Set the initial configuration payload.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }
}

/// A mix group: one mix stage, optionally wrapped in an effects chain.
///
/// A group accepts external inputs for each usage it lists and the outputs
/// of the child groups named in `inputs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MixGroupConfig {
    /// Group name, unique within the topology.
    pub name: String,

    /// Usages routed to this group.
    #[serde(default)]
    pub usages: Vec<StreamUsage>,

    /// Names of child groups mixed into this one.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Effects applied to the group's mix, in order.
    #[serde(default)]
    pub effects: Vec<EffectSpec>,

    /// Whether this group's output is exposed as loopback.
    #[serde(default)]
    pub loopback: bool,

    /// Output frame rate of the group.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Output channel count of the group.
    #[serde(default = "default_channels")]
    pub channels: u32,

    /// Output sample format of the group.
    #[serde(default)]
    pub sample_format: SampleFormat,
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

fn default_channels() -> u32 {
    DEFAULT_CHANNELS
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE_FRAMES
}

impl MixGroupConfig {
    /// Create a 48 kHz stereo float group with no inputs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usages: Vec::new(),
            inputs: Vec::new(),
            effects: Vec::new(),
            loopback: false,
            frame_rate: DEFAULT_FRAME_RATE,
            channels: DEFAULT_CHANNELS,
            sample_format: SampleFormat::Float,
        }
    }

    /// Route a usage to this group.
    pub fn with_usage(mut self, usage: StreamUsage) -> Self {
        self.usages.push(usage);
        self
    }

    /// Route several usages to this group.
    pub fn with_usages(mut self, usages: impl IntoIterator<Item = StreamUsage>) -> Self {
        self.usages.extend(usages);
        self
    }

    /// Mix a child group into this one.
    pub fn with_input(mut self, child: impl Into<String>) -> Self {
        self.inputs.push(child.into());
        self
    }

    /// Append an effect to the chain.
    pub fn with_effect(mut self, effect: EffectSpec) -> Self {
        self.effects.push(effect);
        self
    }

    /// Mark this group as the loopback tap.
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Set the output format fields.
    pub fn with_format(mut self, sample_format: SampleFormat, channels: u32, frame_rate: u32) -> Self {
        self.sample_format = sample_format;
        self.channels = channels;
        self.frame_rate = frame_rate;
        self
    }

    /// The group's validated output format.
    pub fn format(&self) -> Result<Format, FormatError> {
        Format::new(self.sample_format, self.channels, self.frame_rate)
    }
}

/// A complete output pipeline topology.
///
/// # TOML Format
///
/// ```toml
/// root = "output"
/// block_size_frames = 240
/// resampler = "windowed_sinc"
///
/// [[groups]]
/// name = "output"
/// usages = ["background", "interruption", "system-agent"]
/// inputs = ["media", "voice"]
/// loopback = true
///
/// [[groups]]
/// name = "media"
/// usages = ["media"]
///
/// [[groups]]
/// name = "voice"
/// usages = ["communication"]
/// frame_rate = 16000
///
/// [[groups.effects]]
/// type = "gain"
/// instance = "voice_gain"
/// config = "-6dB"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Name of the root group.
    pub root: String,

    /// Maximum frames produced per pull.
    #[serde(default = "default_block_size")]
    pub block_size_frames: u32,

    /// Resampler used when an input does not ask for one.
    #[serde(default)]
    pub resampler: ResamplerPolicy,

    /// All mix groups.
    #[serde(default)]
    pub groups: Vec<MixGroupConfig>,
}

impl PipelineConfig {
    /// Create an empty topology with the given root name.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            block_size_frames: DEFAULT_BLOCK_SIZE_FRAMES,
            resampler: ResamplerPolicy::Default,
            groups: Vec::new(),
        }
    }

    /// Add a group.
    pub fn with_group(mut self, group: MixGroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    /// Set the block size.
    pub fn with_block_size(mut self, frames: u32) -> Self {
        self.block_size_frames = frames;
        self
    }

    /// Set the default resampler.
    pub fn with_resampler(mut self, resampler: ResamplerPolicy) -> Self {
        self.resampler = resampler;
        self
    }

    /// Look up a group by name.
    pub fn group(&self, name: &str) -> Option<&MixGroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// The root group, if it exists.
    pub fn root_group(&self) -> Option<&MixGroupConfig> {
        self.group(&self.root)
    }

    /// The group tapped for loopback, if any.
    pub fn loopback_group(&self) -> Option<&MixGroupConfig> {
        self.groups.iter().find(|g| g.loopback)
    }

    /// Every effect instance in the topology, with its owning group.
    pub fn effect_instances(&self) -> impl Iterator<Item = (&MixGroupConfig, &EffectSpec)> {
        self.groups
            .iter()
            .flat_map(|g| g.effects.iter().map(move |e| (g, e)))
    }

    /// Load a topology from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse a topology from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the topology to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Serialize the topology to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for PipelineConfig {
    /// A single 48 kHz stereo float group accepting every usage, tapped for
    /// loopback.
    fn default() -> Self {
        Self::new("output").with_group(
            MixGroupConfig::new("output")
                .with_usages(StreamUsage::ALL)
                .with_loopback(true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topology() {
        let config = PipelineConfig::default();
        assert_eq!(config.root, "output");
        assert_eq!(config.block_size_frames, 240);
        let root = config.root_group().unwrap();
        assert_eq!(root.usages.len(), 5);
        assert!(root.loopback);
        assert_eq!(root.format().unwrap(), Format::float(2, 48000).unwrap());
        assert_eq!(config.loopback_group().unwrap().name, "output");
    }

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            root = "main"

            [[groups]]
            name = "main"
            usages = ["media", "system-agent"]
            "#,
        )
        .unwrap();
        assert_eq!(config.block_size_frames, DEFAULT_BLOCK_SIZE_FRAMES);
        assert_eq!(config.resampler, ResamplerPolicy::Default);
        let main = config.group("main").unwrap();
        assert_eq!(main.usages, vec![StreamUsage::Media, StreamUsage::SystemAgent]);
        assert_eq!(main.frame_rate, 48000);
        assert_eq!(main.channels, 2);
        assert_eq!(main.sample_format, SampleFormat::Float);
        assert!(!main.loopback);
    }

    #[test]
    fn parses_effects_and_formats() {
        let config = PipelineConfig::from_toml(
            r#"
            root = "out"
            resampler = "point"

            [[groups]]
            name = "out"
            sample_format = "signed16"
            channels = 1
            frame_rate = 16000
            inputs = ["fx"]

            [[groups]]
            name = "fx"
            usages = ["communication"]

            [[groups.effects]]
            type = "gain"
            instance = "voice_gain"
            config = "-6dB"
            "#,
        )
        .unwrap();
        assert_eq!(config.resampler, ResamplerPolicy::Point);
        let out = config.group("out").unwrap();
        assert_eq!(out.sample_format, SampleFormat::Signed16);
        assert_eq!(out.inputs, vec!["fx".to_string()]);
        let (group, effect) = config.effect_instances().next().unwrap();
        assert_eq!(group.name, "fx");
        assert_eq!(effect, &EffectSpec::new("gain", "voice_gain").with_config("-6dB"));
    }

    #[test]
    fn unknown_usage_is_a_parse_error() {
        let result = PipelineConfig::from_toml(
            r#"
            root = "out"
            [[groups]]
            name = "out"
            usages = ["ringtone"]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn toml_round_trip_keeps_topology() {
        let config = PipelineConfig::new("out")
            .with_block_size(480)
            .with_resampler(ResamplerPolicy::WindowedSinc)
            .with_group(MixGroupConfig::new("out").with_input("voice"))
            .with_group(
                MixGroupConfig::new("voice")
                    .with_usage(StreamUsage::Communication)
                    .with_effect(EffectSpec::new("delay", "voice_delay").with_config("10ms")),
            );
        let parsed = PipelineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn invalid_group_format_surfaces() {
        let group = MixGroupConfig::new("g").with_format(SampleFormat::Float, 0, 48000);
        assert_eq!(group.format(), Err(FormatError::InvalidChannels(0)));
    }
}
