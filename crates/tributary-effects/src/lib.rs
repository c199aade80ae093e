//! Tributary Effects - effect hosting for the mix graph
//!
//! Effects stages run an ordered chain of [`AudioEffect`] instances over
//! interleaved `f32` frames. Effects are created by type name through an
//! [`EffectRegistry`], so topology configuration can name them as strings.
//!
//! # Example
//!
//! ```rust
//! use tributary_effects::{AudioEffect, EffectParams, EffectRegistry};
//!
//! let registry = EffectRegistry::new();
//! for effect in registry.all_effects() {
//!     println!("{}: {}", effect.id, effect.description);
//! }
//!
//! let params = EffectParams::new(48000, 2).with_config("50%");
//! let mut gain = registry.create("gain", &params).unwrap();
//!
//! let mut samples = [1.0f32, -1.0];
//! gain.process_inplace(1, &mut samples);
//! assert_eq!(samples, [0.5, -0.5]);
//! ```
//!
//! # Built-in effects
//!
//! | Type | Configuration |
//! |------|---------------|
//! | `passthrough` | ignored |
//! | `gain` | `-6dB`, `0.5`, `50%`, `mute` |
//! | `delay` | `10ms`, `0.5s`, `480` (frames) |

pub mod builtin;
pub mod effect;
pub mod error;
pub mod param;
pub mod registry;

pub use builtin::{DelayEffect, GainEffect, MAX_EFFECT_CHANNELS, PassthroughEffect};
pub use effect::{AudioEffect, EffectParams};
pub use error::{EffectError, UpdateEffectError};
pub use param::{ParamValue, parse_param_value};
pub use registry::{EffectDescriptor, EffectFactory, EffectRegistry};
