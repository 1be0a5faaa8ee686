//! Integration tests for the frame hand-off ring

use display_bridge::frame_ring;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_nothing_published_reads_none() {
    let (_writer, mut reader) = frame_ring(4, 4);
    assert!(reader.try_latest().is_none());
    assert!(!reader.has_fresh());
}

#[test]
fn test_latest_of_many_publishes_wins() {
    let (mut writer, mut reader) = frame_ring(1, 1);

    for value in 1..=5u8 {
        writer.acquire_write_slot().fill([value, value, value]);
        writer.publish();
    }

    let frame = reader.try_latest().expect("a frame was published");
    assert_eq!(frame.pixel(0, 0), [5, 5, 5], "Reader must see the most recent publish");
}

#[test]
fn test_write_slot_never_aliases_latest() {
    let (mut writer, mut reader) = frame_ring(1, 1);

    for i in 0..20 {
        writer.publish();
        assert_ne!(writer.write_index(), writer.latest_index(), "publish #{}", i);
        if i % 3 == 0 {
            reader.try_latest();
            assert_ne!(writer.write_index(), writer.latest_index(), "after read #{}", i);
        }
    }
}

#[test]
fn test_writes_before_publish_are_invisible() {
    let (mut writer, mut reader) = frame_ring(1, 1);
    writer.acquire_write_slot().fill([1, 1, 1]);
    writer.publish();
    assert_eq!(reader.try_latest().map(|f| f.pixel(0, 0)), Some([1, 1, 1]));

    writer.acquire_write_slot().fill([2, 2, 2]);
    assert_eq!(
        reader.try_latest().map(|f| f.pixel(0, 0)),
        Some([1, 1, 1]),
        "Unpublished slot leaked to the reader"
    );
}

#[test]
fn test_frames_are_never_torn_across_threads() {
    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 32;
    const PUBLISHES: u32 = 20_000;

    let (mut writer, mut reader) = frame_ring(WIDTH, HEIGHT);
    let done = Arc::new(AtomicBool::new(false));

    let producer_done = Arc::clone(&done);
    let producer = thread::spawn(move || {
        for n in 1..=PUBLISHES {
            let value = (n % 251) as u8;
            let slot = writer.acquire_write_slot();
            // Row by row so a torn read would mix values.
            for y in 0..HEIGHT {
                slot.row_mut(y).fill(value);
            }
            writer.publish();
        }
        producer_done.store(true, Ordering::Release);
    });

    let mut checked = 0u64;
    let mut last_taken = 0;
    while !done.load(Ordering::Acquire) || reader.has_fresh() {
        if let Some(frame) = reader.try_latest() {
            let first = frame.data()[0];
            assert!(
                frame.data().iter().all(|b| *b == first),
                "Torn frame observed (first byte {})",
                first
            );
            checked += 1;
        }
        assert!(reader.taken() >= last_taken);
        last_taken = reader.taken();
    }

    producer.join().unwrap();
    assert!(checked > 0);
    assert!(reader.taken() <= PUBLISHES as u64);
}
