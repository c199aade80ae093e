//! Effect registry: create effects by type name.

use crate::builtin::{DelayEffect, GainEffect, PassthroughEffect};
use crate::effect::{AudioEffect, EffectParams};
use crate::error::EffectError;

/// Describes an effect type in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectDescriptor {
    /// Unique type name used in configuration (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description of the effect.
    pub description: &'static str,
    /// Example configuration payloads.
    pub config_hint: &'static str,
}

/// Factory function type for creating effects.
pub type EffectFactory = fn(&EffectParams) -> Result<Box<dyn AudioEffect>, EffectError>;

struct RegistryEntry {
    descriptor: EffectDescriptor,
    factory: EffectFactory,
}

/// Registry of available effect types.
///
/// [`EffectRegistry::new`] registers the built-in effects. Hosts add their
/// own with [`EffectRegistry::register`]; a later registration with the same
/// id replaces the earlier one.
pub struct EffectRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.descriptor.id))
            .finish()
    }
}

impl EffectRegistry {
    /// Create a registry with the built-in effects registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin_effects();
        registry
    }

    /// Create a registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            entries: Vec::with_capacity(3),
        }
    }

    fn register_builtin_effects(&mut self) {
        self.register(
            EffectDescriptor {
                id: "passthrough",
                name: "Pass-through",
                description: "Leaves audio untouched",
                config_hint: "(ignored)",
            },
            |params| Ok(Box::new(PassthroughEffect::new(params.channels))),
        );

        self.register(
            EffectDescriptor {
                id: "gain",
                name: "Gain",
                description: "Fixed level change",
                config_hint: "-6dB, 0.5, 50%, mute",
            },
            |params| Ok(Box::new(GainEffect::new(params)?)),
        );

        self.register(
            EffectDescriptor {
                id: "delay",
                name: "Delay",
                description: "Fixed delay line, reported as latency",
                config_hint: "10ms, 0.5s, 480 (frames)",
            },
            |params| Ok(Box::new(DelayEffect::new(params)?)),
        );
    }

    /// Register an effect type.
    pub fn register(&mut self, descriptor: EffectDescriptor, factory: EffectFactory) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.id == descriptor.id)
        {
            entry.descriptor = descriptor;
            entry.factory = factory;
        } else {
            self.entries.push(RegistryEntry {
                descriptor,
                factory,
            });
        }
    }

    /// Descriptors of every registered effect, in registration order.
    pub fn all_effects(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Look up a descriptor by type name.
    pub fn get(&self, id: &str) -> Option<&EffectDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Whether an effect type is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Create an effect by type name.
    ///
    /// # Errors
    ///
    /// [`EffectError::UnknownEffectType`] if nothing is registered under
    /// `id`, or whatever the factory returns for bad parameters.
    pub fn create(
        &self,
        id: &str,
        params: &EffectParams,
    ) -> Result<Box<dyn AudioEffect>, EffectError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .ok_or_else(|| EffectError::UnknownEffectType(id.to_string()))?;
        (entry.factory)(params)
    }

    /// Number of registered effect types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
