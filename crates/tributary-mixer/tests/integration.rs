//! Integration tests for tributary-mixer.
//!
//! Mixes real leaf streams across rate, clock and channel boundaries and
//! checks what lands in the accumulator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use proptest::prelude::*;
use tributary_core::{
    AudioData, ClockRef, Fixed, Format, ManualClock, Packet, PacketQueue, RefTime, SampleFormat,
    SignalSource, TimelineFunction, TimelineRate, VersionedTimelineFunction, Waveform,
};
use tributary_mixer::{GainUpdate, MixJob, Mixer, ResamplerPolicy, finalize};

fn manual_clock() -> ClockRef {
    Arc::new(ManualClock::new(RefTime::ZERO))
}

fn job<'a>(dest: &Format, clock: &'a ClockRef, frame: i64, count: usize) -> MixJob<'a> {
    MixJob {
        ref_time: RefTime::ZERO,
        dest_frame: frame,
        frame_count: count,
        dest_timeline: TimelineFunction::new(0, 0, dest.frac_frames_per_ns()),
        dest_clock: clock,
    }
}

#[test]
fn constant_survives_44k1_to_48k_sinc() {
    let clock = manual_clock();
    let src = Format::float(2, 44100).unwrap();
    let dest = Format::float(2, 48000).unwrap();
    let source = SignalSource::new(src, Waveform::Constant(0.5), Arc::clone(&clock));
    let mut mixer = Mixer::new(src, dest, ResamplerPolicy::WindowedSinc);

    for block in 0..4 {
        let mut accum = vec![0.0; 2 * 240];
        mixer.mix(&source, &job(&dest, &clock, 4800 + block * 240, 240), &mut accum);
        for &s in &accum {
            assert!((s - 0.5).abs() < 1e-4, "block {block}: {s}");
        }
    }
    assert_eq!(mixer.stats().gap_frames, 0);
}

#[test]
fn clocks_running_at_different_rates_still_line_up() {
    let dest_clock = manual_clock();
    // Source clock runs 500ppm fast relative to monotonic.
    let source_clock: ClockRef = Arc::new(ManualClock::with_mapping(
        RefTime::ZERO,
        TimelineFunction::new(0, 0, TimelineRate::new(1_000_000, 1_000_500)),
    ));
    let format = Format::float(1, 48000).unwrap();
    let source = SignalSource::new(format, Waveform::Constant(0.25), source_clock);
    let mut mixer = Mixer::new(format, format, ResamplerPolicy::WindowedSinc);

    let mut accum = vec![0.0; 480];
    let outcome = mixer.mix(&source, &job(&format, &dest_clock, 48_000, 480), &mut accum);
    assert_eq!(outcome.frames_mixed, 480);
    assert!(accum.iter().all(|&s| (s - 0.25).abs() < 1e-4));
}

#[test]
fn paused_source_contributes_silence() {
    let clock = manual_clock();
    let format = Format::float(1, 48000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        TimelineRate::ZERO,
    )));
    let source = SignalSource::with_timeline(
        format,
        Waveform::Constant(1.0),
        Arc::clone(&clock),
        timeline,
    );
    let mut mixer = Mixer::new(format, format, ResamplerPolicy::Point);
    let mut accum = vec![0.0; 64];
    let outcome = mixer.mix(&source, &job(&format, &clock, 0, 64), &mut accum);
    assert!(outcome.silent);
    assert!(accum.iter().all(|&s| s == 0.0));
}

#[test]
fn gaps_in_a_packet_queue_are_zero_filled() {
    let clock = manual_clock();
    let format = Format::float(1, 48000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        format.frac_frames_per_ns(),
    )));
    let queue = PacketQueue::new(format, timeline, Arc::clone(&clock));
    queue
        .push(Packet::new(Fixed::ZERO, AudioData::Float(vec![0.5; 8])))
        .unwrap();
    queue
        .push(Packet::new(Fixed::from_frames(16), AudioData::Float(vec![0.5; 8])))
        .unwrap();

    let mut mixer = Mixer::new(format, format, ResamplerPolicy::Point);
    let mut accum = vec![0.0; 32];
    let outcome = mixer.mix(&queue, &job(&format, &clock, 0, 32), &mut accum);
    assert!(!outcome.silent);

    let expected: Vec<f64> = (0..32)
        .map(|i| if i < 8 || (16..24).contains(&i) { 0.5 } else { 0.0 })
        .collect();
    assert_eq!(accum, expected);
    assert_eq!(mixer.stats().gap_frames, 16);
}

#[test]
fn consumed_packets_are_released_but_history_is_kept() {
    let clock = manual_clock();
    let format = Format::float(1, 48000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        format.frac_frames_per_ns(),
    )));
    let queue = PacketQueue::new(format, timeline, Arc::clone(&clock));
    let released = Arc::new(AtomicUsize::new(0));
    for i in 0..4 {
        let released = Arc::clone(&released);
        queue
            .push(
                Packet::new(Fixed::from_frames(i * 16), AudioData::Float(vec![0.1; 16]))
                    .with_release(move || {
                        released.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .unwrap();
    }

    // The sinc sampler needs 7 frames of history, so after mixing frames
    // 0..32 only the first packet (0..16) may be released.
    let mut mixer = Mixer::new(format, format, ResamplerPolicy::WindowedSinc);
    let mut accum = vec![0.0; 32];
    mixer.mix(&queue, &job(&format, &clock, 0, 32), &mut accum);
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(queue.len(), 3);
}

#[test]
fn gain_ramp_spans_jobs() {
    let clock = manual_clock();
    let format = Format::float(1, 1000).unwrap();
    let source = SignalSource::new(format, Waveform::Constant(1.0), Arc::clone(&clock));
    let mut mixer = Mixer::new(format, format, ResamplerPolicy::Point);
    // 8 frames at 1kHz.
    mixer.apply_gain_update(GainUpdate::Ramp {
        db: tributary_mixer::MUTED_GAIN_DB,
        duration: Duration::from_millis(8),
    });

    let mut first = vec![0.0; 4];
    mixer.mix(&source, &job(&format, &clock, 0, 4), &mut first);
    let mut second = vec![0.0; 4];
    mixer.mix(&source, &job(&format, &clock, 4, 4), &mut second);

    assert_eq!(first, vec![0.875, 0.75, 0.625, 0.5]);
    assert_eq!(second, vec![0.375, 0.25, 0.125, 0.0]);
    assert!(mixer.gain().is_silent());
}

#[test]
fn integer_output_saturates_after_summing() {
    let clock = manual_clock();
    let format = Format::new(SampleFormat::Signed16, 1, 48000).unwrap();
    let a = SignalSource::new(format, Waveform::Constant(0.75), Arc::clone(&clock));
    let b = SignalSource::new(format, Waveform::Constant(0.75), Arc::clone(&clock));
    let mut ma = Mixer::new(format, format, ResamplerPolicy::Point);
    let mut mb = Mixer::new(format, format, ResamplerPolicy::Point);

    let mut accum = vec![0.0; 16];
    ma.mix(&a, &job(&format, &clock, 0, 16), &mut accum);
    mb.mix(&b, &job(&format, &clock, 0, 16), &mut accum);
    assert_eq!(finalize(&accum, SampleFormat::Signed16), AudioData::Signed16(vec![32767; 16]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A DC input stays at the same level through the sinc resampler for any
    /// supported rate pair.
    #[test]
    fn sinc_preserves_dc(
        src_rate in 8_000u32..=96_000,
        dest_rate in 8_000u32..=96_000,
        level in -1.0f32..1.0,
        start in 0i64..100_000,
    ) {
        let clock = manual_clock();
        let src = Format::float(1, src_rate).unwrap();
        let dest = Format::float(1, dest_rate).unwrap();
        let source = SignalSource::new(src, Waveform::Constant(level), Arc::clone(&clock));
        let mut mixer = Mixer::new(src, dest, ResamplerPolicy::WindowedSinc);
        let mut accum = vec![0.0; 128];
        mixer.mix(&source, &job(&dest, &clock, start, 128), &mut accum);
        for &s in &accum {
            prop_assert!((s - f64::from(level)).abs() < 1e-4, "{} vs {}", s, level);
        }
    }
}
