//! Command-line switches. Values given here override the stored settings for
//! the current run only.

use crate::capture::CaptureRequest;
use crate::control::ControlState;
use crate::state::AppState;
use clap::Parser;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "display-bridge")]
#[command(about = "Low-latency fullscreen display of a video capture device")]
#[command(version)]
pub struct Options {
    /// Capture device index
    #[arg(long)]
    pub device: Option<usize>,

    /// Requested capture width
    #[arg(long)]
    pub width: Option<u32>,

    /// Requested capture height
    #[arg(long)]
    pub height: Option<u32>,

    /// Requested capture frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Start with VSync on
    #[arg(long, overrides_with = "no_vsync")]
    pub vsync: bool,

    /// Start with VSync off
    #[arg(long, overrides_with = "vsync")]
    pub no_vsync: bool,

    /// Start with the FPS overlay visible
    #[arg(long, overrides_with = "no_show_fps")]
    pub show_fps: bool,

    /// Start with the FPS overlay hidden
    #[arg(long, overrides_with = "show_fps")]
    pub no_show_fps: bool,

    /// Use a synthetic color-bar source instead of a device
    #[arg(long)]
    pub test_pattern: bool,

    /// Write log lines immediately and echo them to stdout
    #[arg(long)]
    pub stream_logs: bool,
}

impl Options {
    pub fn capture_request(&self, stored: &AppState) -> CaptureRequest {
        let base = stored.capture_request();
        CaptureRequest {
            device: self.device.unwrap_or(base.device),
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            fps: self.fps.unwrap_or(base.fps),
            fourcc: base.fourcc,
        }
    }

    /// Starting hotkey state: an explicit switch wins, otherwise the stored
    /// value from the last session applies.
    pub fn initial_control(&self, stored: &AppState) -> ControlState {
        ControlState::new(
            flag(self.show_fps, self.no_show_fps, stored.overlay_visible),
            flag(self.vsync, self.no_vsync, stored.vsync_enabled),
        )
    }
}

fn flag(on: bool, off: bool, stored: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => stored,
    }
}
