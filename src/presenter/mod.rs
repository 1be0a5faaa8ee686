//! GPU presentation stage.
//!
//! The platform-neutral parts live here: the [`Presenter`] seam the control
//! loop drives, the letterbox math, the BGR to 4-channel row expansion and the
//! present-mode decision. The Direct3D 11 backend sits behind `cfg(windows)`.

#[cfg(windows)]
mod d3d11;

#[cfg(windows)]
pub use d3d11::D3D11Presenter;

use crate::control::ControlState;
use crate::frame::{Frame, BYTES_PER_PIXEL};
use thiserror::Error;

/// Bytes per texel in the upload texture.
pub const UPLOAD_BYTES_PER_PIXEL: usize = 4;

const OPAQUE: u8 = 0xFF;

#[derive(Error, Debug)]
pub enum PresenterError {
    #[error("Presenter initialization failed: {0}")]
    Init(String),
    #[error("Failed to create {width}x{height} upload texture: {reason}")]
    TextureCreate { width: u32, height: u32, reason: String },
    #[error("Failed to map upload texture: {0}")]
    UploadMap(String),
    #[error("Present failed: {0}")]
    Present(String),
    #[error("Presenter is {0:?}")]
    InvalidState(PresenterState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterState {
    Uninitialized,
    Initialized,
    Destroyed,
}

pub trait Presenter {
    /// Makes sure the upload texture matches the source size. Must be a cheap
    /// no-op when it already does.
    fn ensure_upload_texture(&mut self, width: u32, height: u32) -> Result<(), PresenterError>;

    fn upload_frame(&mut self, frame: &Frame) -> Result<(), PresenterError>;

    /// Clears, draws the current texture letterboxed and presents.
    fn render(&mut self, control: &ControlState) -> Result<(), PresenterError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Largest centred rectangle with the texture's aspect ratio that fits the
/// surface.
pub fn letterbox(tex_width: u32, tex_height: u32, surface_width: u32, surface_height: u32) -> Viewport {
    let (sw, sh) = (surface_width as f32, surface_height as f32);
    if tex_width == 0 || tex_height == 0 {
        return Viewport {
            x: 0.0,
            y: 0.0,
            width: sw,
            height: sh,
        };
    }

    let (tw, th) = (tex_width as f32, tex_height as f32);
    let scale = (sw / tw).min(sh / th);
    let width = tw * scale;
    let height = th * scale;

    Viewport {
        x: (sw - width) * 0.5,
        y: (sh - height) * 0.5,
        width,
        height,
    }
}

/// Number of bytes a mapped texture must expose for `height` rows of
/// `width` texels at `row_pitch`.
pub fn mapped_len(width: u32, height: u32, row_pitch: usize) -> usize {
    if height == 0 {
        return 0;
    }
    row_pitch * (height as usize - 1) + width as usize * UPLOAD_BYTES_PER_PIXEL
}

/// Copies `frame` into `dst`, one row per `row_pitch` bytes, appending an
/// opaque alpha byte to every pixel. Channel order is left as-is.
///
/// Bytes between the end of a row's texels and the next row are not touched.
pub fn expand_rows(frame: &Frame, dst: &mut [u8], row_pitch: usize) {
    let row_bytes = frame.width() as usize * UPLOAD_BYTES_PER_PIXEL;
    assert!(row_pitch >= row_bytes, "row pitch {} < row size {}", row_pitch, row_bytes);
    assert!(
        dst.len() >= mapped_len(frame.width(), frame.height(), row_pitch),
        "destination too small"
    );

    for y in 0..frame.height() {
        let start = y as usize * row_pitch;
        let dst_row = &mut dst[start..start + row_bytes];
        for (src, texel) in frame
            .row(y)
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(dst_row.chunks_exact_mut(UPLOAD_BYTES_PER_PIXEL))
        {
            texel[..BYTES_PER_PIXEL].copy_from_slice(src);
            texel[BYTES_PER_PIXEL] = OPAQUE;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    /// Wait for the next vertical blank.
    VSync,
    /// Immediate, allowed to tear on variable-refresh displays.
    Tearing,
    /// Immediate without the tearing flag.
    Immediate,
}

pub fn present_mode(vsync_enabled: bool, tearing_supported: bool) -> PresentMode {
    if vsync_enabled {
        PresentMode::VSync
    } else if tearing_supported {
        PresentMode::Tearing
    } else {
        PresentMode::Immediate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_viewport(vp: Viewport, x: f32, y: f32, w: f32, h: f32) {
        let close = |a: f32, b: f32| (a - b).abs() < 0.01;
        assert!(
            close(vp.x, x) && close(vp.y, y) && close(vp.width, w) && close(vp.height, h),
            "got {:?}, expected ({}, {}, {}, {})",
            vp,
            x,
            y,
            w,
            h
        );
    }

    #[test]
    fn letterbox_wide_source_on_square_surface() {
        assert_viewport(letterbox(1920, 1080, 1280, 1280), 0.0, 280.0, 1280.0, 720.0);
    }

    #[test]
    fn letterbox_pillarboxes_four_by_three() {
        assert_viewport(letterbox(640, 480, 1920, 1080), 240.0, 0.0, 1440.0, 1080.0);
    }

    #[test]
    fn letterbox_matching_aspect_fills_surface() {
        assert_viewport(letterbox(1280, 720, 1920, 1080), 0.0, 0.0, 1920.0, 1080.0);
    }

    #[test]
    fn letterbox_without_texture_covers_surface() {
        assert_viewport(letterbox(0, 0, 800, 600), 0.0, 0.0, 800.0, 600.0);
    }

    #[test]
    fn expand_respects_row_pitch() {
        let mut frame = Frame::new(3, 2);
        for (i, byte) in frame.data_mut().iter_mut().enumerate() {
            *byte = i as u8 + 1;
        }

        let pitch = 16;
        let mut dst = vec![0xEEu8; pitch * 2];
        expand_rows(&frame, &mut dst, pitch);

        for y in 0..2 {
            let row = &dst[y * pitch..(y + 1) * pitch];
            let src = frame.row(y as u32);
            for x in 0..3 {
                assert_eq!(&row[x * 4..x * 4 + 3], &src[x * 3..x * 3 + 3]);
                assert_eq!(row[x * 4 + 3], 0xFF);
            }
            assert!(row[12..].iter().all(|b| *b == 0xEE), "row {} padding was written", y);
        }
    }

    #[test]
    fn expand_accepts_exact_mapped_length() {
        let frame = Frame::new(3, 2);
        let mut dst = vec![0u8; mapped_len(3, 2, 16)];
        assert_eq!(dst.len(), 28);
        expand_rows(&frame, &mut dst, 16);
    }

    #[test]
    fn present_mode_selection() {
        assert_eq!(present_mode(true, true), PresentMode::VSync);
        assert_eq!(present_mode(true, false), PresentMode::VSync);
        assert_eq!(present_mode(false, true), PresentMode::Tearing);
        assert_eq!(present_mode(false, false), PresentMode::Immediate);
    }
}
