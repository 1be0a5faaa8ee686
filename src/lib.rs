pub mod capture;
pub mod control;
pub mod frame;
pub mod hud;
pub mod logger;
pub mod options;
pub mod platform;
pub mod presenter;
pub mod ring;
pub mod state;

pub use capture::{CaptureError, CaptureFormat, CaptureProducer, CaptureRequest, FourCc, VideoSource};
pub use control::{ControlLoop, ControlState, Trigger};
pub use frame::Frame;
pub use logger::*;
pub use options::Options;
pub use presenter::{Presenter, PresenterError};
pub use ring::{frame_ring, FrameReader, FrameWriter};
pub use state::{AppState, KeyBindings, StateManager};
