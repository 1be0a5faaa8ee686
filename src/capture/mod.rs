//! Video capture side of the pipeline.
//!
//! A [`VideoSource`] is opened on the capture thread, pumped by
//! [`CaptureProducer`] and its frames published into the ring.

#[cfg(windows)]
pub mod camera;
pub mod convert;
pub mod producer;
pub mod test_pattern;

pub use producer::CaptureProducer;
pub use test_pattern::TestPatternSource;

use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open capture device {device}: {reason}")]
    Open { device: usize, reason: String },
    #[error("Frame read failed: {0}")]
    Read(String),
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(FourCc),
    #[error("Failed to start capture thread: {0}")]
    Spawn(String),
    #[error("Capture thread exited before reporting its format")]
    Disconnected,
}

/// Four-character pixel format tag as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const YUY2: FourCc = FourCc(*b"YUY2");
    pub const MJPG: FourCc = FourCc(*b"MJPG");
    pub const NV12: FourCc = FourCc(*b"NV12");
    pub const BGR3: FourCc = FourCc(*b"BGR3");
    pub const RGB3: FourCc = FourCc(*b"RGB3");
    pub const GREY: FourCc = FourCc(*b"GREY");
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            let ch = if byte.is_ascii_graphic() { byte as char } else { '?' };
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

/// What the bridge asks the device for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub device: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub fourcc: FourCc,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            device: 0,
            width: 1920,
            height: 1080,
            fps: 60,
            fourcc: FourCc::YUY2,
        }
    }
}

/// What the device actually delivers. Fixed for the lifetime of a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub fourcc: FourCc,
}

pub trait VideoSource {
    /// Negotiated format, queried once when the producer starts.
    fn format(&self) -> CaptureFormat;

    /// Blocks until the device delivers its next frame and decodes it into
    /// `dst` as BGR24, resizing `dst` if needed.
    ///
    /// `Ok(false)` means the device produced an empty frame.
    fn read_frame(&mut self, dst: &mut Frame) -> Result<bool, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_display_masks_non_printable() {
        assert_eq!(FourCc::MJPG.to_string(), "MJPG");
        assert_eq!(FourCc([b'A', 0, b'B', 0x7F]).to_string(), "A?B?");
    }
}
