//! Thin OS layer: window, message pump, key polling and thread priority.

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::{AsyncKeyInput, FullscreenWindow, Win32EventPump};

/// Asks the scheduler to favour the calling (capture) thread.
pub fn raise_capture_thread_priority() {
    #[cfg(windows)]
    win32::raise_current_thread_priority();
}
