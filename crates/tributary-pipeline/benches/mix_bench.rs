//! Criterion benchmarks for the mix path.
//!
//! One iteration is one 5ms block pulled from the pipeline root, which is
//! the unit of work the mix thread must finish inside its deadline.
//!
//! Run with: `cargo bench -p tributary-pipeline -- mix/`
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tributary_config::{EffectSpec, MixGroupConfig, PipelineConfig};
use tributary_core::{
    ClockRef, Format, ManualClock, ReadableStream, RefTime, SignalSource, StreamRef, StreamUsage,
    TimelineFunction, VersionedTimelineFunction, Waveform,
};
use tributary_effects::EffectRegistry;
use tributary_mixer::ResamplerPolicy;
use tributary_pipeline::{OutputPipeline, PipelineOptions};

const BLOCK: usize = 240;

fn build(config: &PipelineConfig, inputs: usize, source_rate: u32) -> OutputPipeline {
    let clock: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
    let format = Format::float(2, 48000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        format.frac_frames_per_ns(),
    )));
    let pipeline = OutputPipeline::new(
        config,
        &EffectRegistry::new(),
        PipelineOptions::default(),
        timeline,
        Arc::clone(&clock),
    )
    .unwrap();

    let source_format = Format::float(2, source_rate).unwrap();
    for i in 0..inputs {
        let stream: StreamRef = Arc::new(SignalSource::new(
            source_format,
            Waveform::Sine {
                frequency: 220.0 * (i + 1) as f32,
                amplitude: 0.1,
            },
            Arc::clone(&clock),
        ));
        pipeline
            .add_input(stream, StreamUsage::Media, ResamplerPolicy::Default)
            .unwrap();
    }
    pipeline
}

fn pull_block(pipeline: &OutputPipeline, frame: &mut i64) {
    let buf = pipeline.read_lock(RefTime::ZERO, *frame, BLOCK).unwrap();
    black_box(buf.data());
    *frame += BLOCK as i64;
}

fn bench_mix(c: &mut Criterion) {
    let plain = PipelineConfig::new("out")
        .with_group(MixGroupConfig::new("out").with_usage(StreamUsage::Media));
    let mut group = c.benchmark_group("mix");

    for &(label, rate) in &[("point", 48000u32), ("sinc", 44100)] {
        for inputs in [1usize, 4, 16] {
            let pipeline = build(&plain, inputs, rate);
            let mut frame = 0i64;
            group.bench_with_input(BenchmarkId::new(label, inputs), &inputs, |b, _| {
                b.iter(|| pull_block(&pipeline, &mut frame));
            });
        }
    }
    group.finish();

    let with_effects = PipelineConfig::new("out").with_group(
        MixGroupConfig::new("out")
            .with_usage(StreamUsage::Media)
            .with_effect(EffectSpec::new("gain", "master").with_config("-3dB"))
            .with_effect(EffectSpec::new("delay", "align").with_config("2ms")),
    );
    let pipeline = build(&with_effects, 4, 48000);
    let mut frame = 0i64;
    c.bench_function("mix/effects_chain", |b| {
        b.iter(|| pull_block(&pipeline, &mut frame));
    });
}

criterion_group!(benches, bench_mix);
criterion_main!(benches);
