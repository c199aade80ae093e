//! Integration tests for tributary-effects.
//!
//! Drives registry-created effects through chains the way an effects stage
//! does.

use proptest::prelude::*;
use tributary_effects::{AudioEffect, EffectError, EffectParams, EffectRegistry};

fn chain(registry: &EffectRegistry, specs: &[(&str, &str)]) -> Vec<Box<dyn AudioEffect>> {
    specs
        .iter()
        .map(|(ty, config)| {
            registry
                .create(ty, &EffectParams::new(48000, 2).with_config(*config))
                .unwrap()
        })
        .collect()
}

fn run(chain: &mut [Box<dyn AudioEffect>], frames: usize, samples: &mut [f32]) {
    for fx in chain.iter_mut() {
        fx.process_inplace(frames, samples);
    }
}

#[test]
fn chain_applies_in_declaration_order() {
    let registry = EffectRegistry::new();
    let mut fx = chain(&registry, &[("delay", "1"), ("gain", "50%")]);
    let mut samples = [1.0, 1.0, 0.5, 0.5];
    run(&mut fx, 2, &mut samples);
    assert_eq!(samples, [0.0, 0.0, 0.5, 0.5]);

    let total_latency: u32 = fx.iter().map(|f| f.latency_frames()).sum();
    assert_eq!(total_latency, 1);
}

#[test]
fn updating_one_instance_leaves_others_alone() {
    let registry = EffectRegistry::new();
    let mut fx = chain(&registry, &[("gain", "0.5"), ("gain", "0.5")]);
    fx[0].update_configuration("-6dB").unwrap();
    let mut samples = [1.0, 1.0];
    run(&mut fx, 1, &mut samples);
    let expected = 0.501_187 * 0.5;
    assert!((samples[0] - expected).abs() < 1e-5);
}

#[test]
fn factories_validate_channels() {
    let registry = EffectRegistry::new();
    for effect in registry.all_effects() {
        let result = registry.create(effect.id, &EffectParams::new(48000, 9));
        if effect.id == "passthrough" {
            assert!(result.is_ok());
        } else {
            assert!(
                matches!(result, Err(EffectError::UnsupportedChannels { channels: 9, .. })),
                "{}",
                effect.id
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Unity gain and pass-through never alter samples.
    #[test]
    fn identity_chain_is_exact(samples in prop::collection::vec(-1.0f32..1.0, 2..256)) {
        let registry = EffectRegistry::new();
        let mut fx = chain(&registry, &[("passthrough", ""), ("gain", "0dB"), ("delay", "")]);
        let frames = samples.len() / 2;
        let mut buf = samples[..frames * 2].to_vec();
        run(&mut fx, frames, &mut buf);
        prop_assert_eq!(&buf[..], &samples[..frames * 2]);
    }

    /// A delay of N frames shifts the signal by exactly N frames.
    #[test]
    fn delay_shifts_by_latency(
        delay in 0usize..32,
        samples in prop::collection::vec(-1.0f32..1.0, 64..128),
    ) {
        let registry = EffectRegistry::new();
        let params = EffectParams::new(48000, 1).with_config(delay.to_string());
        let mut fx = registry.create("delay", &params).unwrap();
        let mut buf = samples.clone();
        fx.process_inplace(buf.len(), &mut buf);
        prop_assert_eq!(fx.latency_frames() as usize, delay);
        for (i, &s) in buf.iter().enumerate() {
            let expected = if i < delay { 0.0 } else { samples[i - delay] };
            prop_assert_eq!(s, expected);
        }
    }
}
