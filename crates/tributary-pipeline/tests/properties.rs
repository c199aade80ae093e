//! Property-based tests for the mix graph.
//!
//! Mixing must not depend on attach order, trims must be idempotent, an
//! empty stage must always produce a full block of silence and an empty
//! effect chain must not touch a single bit.

use std::sync::Arc;

use proptest::prelude::*;
use tributary_config::{MixGroupConfig, PipelineConfig};
use tributary_core::{
    AudioData, ClockRef, Format, ManualClock, ReadableStream, RefTime, SampleFormat, SignalSource,
    StreamRef, StreamUsage, TimelineFunction, VersionedTimelineFunction, Waveform,
};
use tributary_effects::EffectRegistry;
use tributary_mixer::ResamplerPolicy;
use tributary_pipeline::{EffectsStage, OutputPipeline, PipelineOptions};

fn pipeline(sample_format: SampleFormat, clock: &ClockRef) -> OutputPipeline {
    let config = PipelineConfig::new("out").with_group(
        MixGroupConfig::new("out")
            .with_usage(StreamUsage::Media)
            .with_format(sample_format, 2, 48000),
    );
    let format = Format::new(sample_format, 2, 48000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        format.frac_frames_per_ns(),
    )));
    OutputPipeline::new(
        &config,
        &EffectRegistry::new(),
        PipelineOptions::default(),
        timeline,
        Arc::clone(clock),
    )
    .unwrap()
}

fn sine(frequency: f32, amplitude: f32, rate: u32, clock: &ClockRef) -> StreamRef {
    Arc::new(SignalSource::new(
        Format::float(2, rate).unwrap(),
        Waveform::Sine {
            frequency,
            amplitude,
        },
        Arc::clone(clock),
    ))
}

fn mix_in_order(inputs: &[(f32, f32, u32)], order: &[usize], frames: usize) -> Vec<f32> {
    let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
    let p = pipeline(SampleFormat::Float, &clock);
    let streams: Vec<StreamRef> = inputs
        .iter()
        .map(|&(f, a, rate)| sine(f, a, rate, &clock))
        .collect();
    for &i in order {
        p.add_input(Arc::clone(&streams[i]), StreamUsage::Media, ResamplerPolicy::Default)
            .unwrap();
    }
    let out = p.read_lock(RefTime::ZERO, 0, frames).unwrap();
    let samples = out.data().to_normalized();
    drop(out);
    for stream in &streams {
        p.remove_input(stream).unwrap();
    }
    samples
}

fn input() -> impl Strategy<Value = (f32, f32, u32)> {
    (
        20.0f32..4000.0,
        0.0f32..0.2,
        prop::sample::select(vec![16000u32, 44100, 48000]),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Two inputs mix to the same bits in either attach order.
    #[test]
    fn two_inputs_commute_exactly(a in input(), b in input(), frames in 1usize..=240) {
        let forward = mix_in_order(&[a, b], &[0, 1], frames);
        let reverse = mix_in_order(&[a, b], &[1, 0], frames);
        prop_assert_eq!(forward, reverse);
    }

    /// Any attach order of N inputs mixes to the same result within
    /// accumulation rounding.
    #[test]
    fn n_inputs_commute(
        inputs in prop::collection::vec(input(), 3..6),
        seed in any::<u64>(),
    ) {
        let forward: Vec<usize> = (0..inputs.len()).collect();
        let mut shuffled = forward.clone();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.swap(0, len - 1);

        let a = mix_in_order(&inputs, &forward, 240);
        let b = mix_in_order(&inputs, &shuffled, 240);
        for (x, y) in a.iter().zip(&b) {
            prop_assert!((x - y).abs() < 1e-6, "{} vs {}", x, y);
        }
    }

    /// Repeating or reordering trims never moves an input's trim point
    /// past the latest requested time.
    #[test]
    fn trim_is_idempotent(times in prop::collection::vec(0i64..1_000_000_000, 1..16)) {
        let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
        let p = pipeline(SampleFormat::Float, &clock);
        let source = Arc::new(SignalSource::new(
            Format::float(2, 48000).unwrap(),
            Waveform::Constant(0.5),
            Arc::clone(&clock),
        ));
        let stream: StreamRef = source.clone();
        p.add_input(Arc::clone(&stream), StreamUsage::Media, ResamplerPolicy::Point)
            .unwrap();

        for &t in &times {
            p.trim(RefTime::from_nanos(t));
            p.trim(RefTime::from_nanos(t));
        }
        let latest = times.iter().copied().max().unwrap();
        prop_assert_eq!(source.last_trim(), Some(RefTime::from_nanos(latest)));
        p.remove_input(&stream).unwrap();
    }

    /// With nothing attached every read is a full-length block of silence.
    #[test]
    fn empty_pipeline_is_silent(
        sample_format in prop::sample::select(SampleFormat::ALL.to_vec()),
        frame in -10_000i64..10_000,
        frames in 1usize..=240,
    ) {
        let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
        let p = pipeline(sample_format, &clock);
        let out = p.read_lock(RefTime::ZERO, frame, frames).unwrap();
        prop_assert_eq!(out.frames(), frames);
        prop_assert_eq!(out.data(), &AudioData::silence(sample_format, frames * 2));
    }

    /// An effects stage with no effects hands the child's buffer through
    /// untouched.
    #[test]
    fn empty_chain_is_bit_exact(
        frequency in 20.0f32..20_000.0,
        amplitude in 0.0f32..1.0,
        frame in -10_000i64..10_000,
        frames in 1usize..=512,
    ) {
        let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
        let child = sine(frequency, amplitude, 48000, &clock);
        let stage = EffectsStage::new("fx", Arc::clone(&child), Vec::new()).unwrap();

        let direct = child.read_lock(RefTime::ZERO, frame, frames).unwrap();
        let through = stage.read_lock(RefTime::ZERO, frame, frames).unwrap();
        prop_assert_eq!(through.start(), direct.start());
        prop_assert_eq!(through.data(), direct.data());
    }
}
