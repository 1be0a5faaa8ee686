//! Integration tests for the capture producer thread

use display_bridge::capture::{CaptureError, CaptureFormat, CaptureProducer, FourCc, TestPatternSource, VideoSource};
use display_bridge::{frame_ring, Frame};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_producer_publishes_test_pattern() {
    let (writer, mut reader) = frame_ring(32, 16);
    let producer = CaptureProducer::spawn(|| Ok(TestPatternSource::new(32, 16, 0)), writer).unwrap();

    assert_eq!(producer.width(), 32);
    assert_eq!(producer.height(), 16);
    assert_eq!(producer.fourcc(), FourCc::BGR3);
    assert!(producer.is_running());

    assert!(wait_for(|| reader.try_latest().is_some()), "No frame published");
    let frame = reader.try_latest().unwrap();
    assert_eq!((frame.width(), frame.height()), (32, 16));

    producer.stop();
    assert!(!producer.is_running());
}

#[test]
fn test_stop_is_idempotent_and_callable_from_another_thread() {
    let (writer, _reader) = frame_ring(8, 8);
    let producer = Arc::new(CaptureProducer::spawn(|| Ok(TestPatternSource::new(8, 8, 120)), writer).unwrap());

    let remote = Arc::clone(&producer);
    thread::spawn(move || remote.stop()).join().unwrap();

    producer.stop();
    producer.stop();
    assert!(!producer.is_running());
}

#[test]
fn test_open_failure_is_reported() {
    let (writer, _reader) = frame_ring(8, 8);
    let result = CaptureProducer::spawn(
        || -> Result<TestPatternSource, CaptureError> {
            Err(CaptureError::Open {
                device: 3,
                reason: "not found".to_string(),
            })
        },
        writer,
    );

    match result {
        Err(CaptureError::Open { device, .. }) => assert_eq!(device, 3),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("open failure was swallowed"),
    }
}

/// Alternates failed, empty and good reads.
struct FlakySource {
    reads: u64,
}

impl VideoSource for FlakySource {
    fn format(&self) -> CaptureFormat {
        CaptureFormat {
            width: 2,
            height: 2,
            fps: 30.0,
            fourcc: FourCc::YUY2,
        }
    }

    fn read_frame(&mut self, dst: &mut Frame) -> Result<bool, CaptureError> {
        self.reads += 1;
        thread::sleep(Duration::from_micros(200));
        match self.reads % 3 {
            0 => Err(CaptureError::Read("usb hiccup".to_string())),
            1 => Ok(false),
            _ => {
                dst.resize(2, 2);
                dst.fill([(self.reads % 3) as u8, (self.reads % 256) as u8, 0]);
                Ok(true)
            }
        }
    }
}

#[test]
fn test_transient_read_failures_are_skipped() {
    let (writer, mut reader) = frame_ring(2, 2);
    let producer = CaptureProducer::spawn(|| Ok(FlakySource { reads: 0 }), writer).unwrap();

    assert!(wait_for(|| {
        reader.try_latest();
        reader.taken() >= 3
    }));

    let frame = reader.try_latest().unwrap();
    // Only good reads (reads % 3 == 2) are ever published.
    assert_eq!(frame.pixel(0, 0)[0], 2);
    assert!(producer.is_running());
}
