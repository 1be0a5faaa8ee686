use super::{CaptureError, CaptureFormat, FourCc, VideoSource};
use crate::frame::Frame;
use std::time::{Duration, Instant};

// Classic SMPTE-ish bar order, stored as BGR.
const BARS: [[u8; 3]; 8] = [
    [192, 192, 192],
    [0, 192, 192],
    [192, 192, 0],
    [0, 192, 0],
    [192, 0, 192],
    [0, 0, 192],
    [192, 0, 0],
    [16, 16, 16],
];

/// Synthetic source: scrolling color bars paced at the requested rate.
///
/// Stands in for a capture device when none is attached (`--test-pattern`)
/// and drives the producer in tests.
pub struct TestPatternSource {
    format: CaptureFormat,
    interval: Option<Duration>,
    next_deadline: Instant,
    frame_index: u64,
    max_frames: Option<u64>,
}

impl TestPatternSource {
    /// `fps == 0` disables pacing; frames are produced as fast as they are read.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        let interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        Self {
            format: CaptureFormat {
                width,
                height,
                fps: fps as f64,
                fourcc: FourCc::BGR3,
            },
            interval,
            next_deadline: Instant::now(),
            frame_index: 0,
            max_frames: None,
        }
    }

    /// After `count` frames every read returns an empty frame, imitating a
    /// device that stalled.
    pub fn with_frame_limit(mut self, count: u64) -> Self {
        self.max_frames = Some(count);
        self
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_index
    }

    fn pace(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if self.next_deadline > now {
            spin_sleep::sleep(self.next_deadline - now);
            self.next_deadline += interval;
        } else {
            // Fell behind; resynchronise instead of bursting.
            self.next_deadline = now + interval;
        }
    }
}

impl VideoSource for TestPatternSource {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn read_frame(&mut self, dst: &mut Frame) -> Result<bool, CaptureError> {
        self.pace();

        if self.max_frames.is_some_and(|max| self.frame_index >= max) {
            return Ok(false);
        }

        let (width, height) = (self.format.width, self.format.height);
        dst.resize(width, height);
        if dst.is_empty() {
            return Ok(false);
        }

        let bar_width = (width as usize / BARS.len()).max(1);
        let offset = (self.frame_index as usize * 4) % width as usize;
        for y in 0..height {
            let row = dst.row_mut(y);
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let bar = ((x + offset) / bar_width) % BARS.len();
                px.copy_from_slice(&BARS[bar]);
            }
        }

        self.frame_index += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_requested_size() {
        let mut source = TestPatternSource::new(16, 4, 0);
        let mut frame = Frame::default();
        assert!(source.read_frame(&mut frame).unwrap());
        assert_eq!((frame.width(), frame.height()), (16, 4));
        assert_eq!(frame.pixel(0, 0), BARS[0]);
        assert_eq!(frame.pixel(15, 3), BARS[7]);
    }

    #[test]
    fn bars_scroll_between_frames() {
        let mut source = TestPatternSource::new(16, 1, 0);
        let mut first = Frame::default();
        let mut second = Frame::default();
        source.read_frame(&mut first).unwrap();
        source.read_frame(&mut second).unwrap();
        assert_ne!(first.data(), second.data());
    }

    #[test]
    fn frame_limit_yields_empty_reads() {
        let mut source = TestPatternSource::new(4, 4, 0).with_frame_limit(1);
        let mut frame = Frame::default();
        assert!(source.read_frame(&mut frame).unwrap());
        assert!(!source.read_frame(&mut frame).unwrap());
        assert_eq!(source.frames_produced(), 1);
    }
}
