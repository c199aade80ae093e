//! Integration tests for tributary-core.
//!
//! Exercises leaf streams through the `ReadableStream` trait object the way
//! the mix graph uses them: shared across threads, re-timed while readers
//! are active, and trimmed from a consumer's clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tributary_core::{
    AudioData, ClockRef, Fixed, Format, ManualClock, Packet, PacketQueue, RefTime,
    ReadableStream, SignalSource, StreamRef, TimelineFunction, TimelineRate,
    VersionedTimelineFunction, Waveform, translate_time,
};

fn manual_clock() -> ClockRef {
    Arc::new(ManualClock::new(RefTime::ZERO))
}

#[test]
fn packet_queue_is_readable_through_trait_object() {
    let format = Format::float(2, 48000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        format.frac_frames_per_ns(),
    )));
    let queue = Arc::new(PacketQueue::new(format, timeline, manual_clock()));
    queue
        .push(Packet::new(Fixed::ZERO, AudioData::Float(vec![0.5; 2 * 480])))
        .unwrap();

    let stream: StreamRef = queue.clone();
    let buf = stream.read_lock(RefTime::ZERO, 0, 240).unwrap();
    assert_eq!(buf.frames(), 240);
    assert_eq!(buf.channels(), 2);
    assert_eq!(buf.sample(239, 1), 0.5);
    drop(buf);

    // 10ms at 48kHz is frame 480: the packet ends there and is released.
    stream.trim(RefTime::from_nanos(10_000_000));
    assert!(queue.is_empty());
}

#[test]
fn timeline_updates_are_visible_to_readers() {
    let format = Format::float(1, 48000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        format.frac_frames_per_ns(),
    )));
    let source = SignalSource::with_timeline(
        format,
        Waveform::Constant(0.1),
        manual_clock(),
        Arc::clone(&timeline),
    );
    let before = source.ref_time_to_frac_frame();

    // Pause the stream at frame 100.
    timeline.update(TimelineFunction::new(100 << 13, 0, TimelineRate::ZERO));
    let after = source.ref_time_to_frac_frame();

    assert!(after.generation > before.generation);
    assert!(!after.function.is_invertible());
    let buf = source.read_lock(RefTime::ZERO, 0, 8).unwrap();
    assert_eq!(buf.timeline().generation, after.generation);
}

#[test]
fn concurrent_push_and_read() {
    let format = Format::float(1, 1000).unwrap();
    let timeline = Arc::new(VersionedTimelineFunction::new(TimelineFunction::new(
        0,
        0,
        format.frac_frames_per_ns(),
    )));
    let queue = Arc::new(PacketQueue::new(format, timeline, manual_clock()));
    let released = Arc::new(AtomicUsize::new(0));

    let producer = {
        let queue = Arc::clone(&queue);
        let released = Arc::clone(&released);
        thread::spawn(move || {
            for i in 0..100i64 {
                let released = Arc::clone(&released);
                queue
                    .push(
                        Packet::new(Fixed::from_frames(i * 10), AudioData::Float(vec![1.0; 10]))
                            .with_release(move || {
                                released.fetch_add(1, Ordering::SeqCst);
                            }),
                    )
                    .unwrap();
            }
        })
    };

    let mut frame = 0i64;
    while frame < 1000 {
        match queue.read_lock(RefTime::ZERO, frame, 10) {
            Some(buf) => frame = buf.end().floor(),
            None => thread::sleep(Duration::from_micros(50)),
        }
    }
    producer.join().unwrap();

    assert_eq!(released.load(Ordering::SeqCst), 100);
    assert_eq!(queue.underflow_count(), 0);
}

#[test]
fn trim_time_translates_across_clocks() {
    let consumer: ClockRef = Arc::new(ManualClock::new(RefTime::ZERO));
    // Producer clock reads 2ms ahead of monotonic.
    let producer: ClockRef = Arc::new(ManualClock::with_mapping(
        RefTime::ZERO,
        TimelineFunction::new(0, 2_000_000, TimelineRate::IDENTITY),
    ));
    let t = translate_time(RefTime::from_nanos(1_000_000), &consumer, &producer);
    assert_eq!(t, RefTime::from_nanos(3_000_000));
}
