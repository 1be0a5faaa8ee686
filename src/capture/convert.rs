//! CPU-side decoders that write straight into a ring slot.

use super::{CaptureError, FourCc};
use crate::frame::{Frame, BYTES_PER_PIXEL};

/// How a device frame of a given pixel format reaches BGR24.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRoute {
    /// Converted here, row by row, with [`yuyv_to_bgr`].
    Yuyv,
    /// Decoded to RGB by the capture library, then [`swap_red_blue`].
    Library,
}

pub fn decode_route(fourcc: FourCc) -> Result<DecodeRoute, CaptureError> {
    match fourcc {
        FourCc::YUY2 => Ok(DecodeRoute::Yuyv),
        FourCc::MJPG | FourCc::NV12 | FourCc::GREY | FourCc::RGB3 => Ok(DecodeRoute::Library),
        other => Err(CaptureError::UnsupportedFormat(other)),
    }
}

/// Decodes packed YUY2 (Y0 U Y1 V) into BGR24 using BT.601 limited-range
/// integer coefficients.
///
/// `src_stride` is the distance between source rows in bytes. Returns `false`
/// if `src` is too short for the given geometry; `dst` is left resized but
/// partially written in that case.
pub fn yuyv_to_bgr(src: &[u8], width: u32, height: u32, src_stride: usize, dst: &mut Frame) -> bool {
    let row_bytes = width as usize * 2;
    if src_stride < row_bytes || height == 0 {
        return false;
    }
    let needed = src_stride * (height as usize - 1) + row_bytes;
    if src.len() < needed {
        return false;
    }

    dst.resize(width, height);
    for y in 0..height {
        let src_row = &src[y as usize * src_stride..y as usize * src_stride + row_bytes];
        let dst_row = dst.row_mut(y);

        for (pair, out) in src_row
            .chunks_exact(4)
            .zip(dst_row.chunks_mut(BYTES_PER_PIXEL * 2))
        {
            let (y0, u, y1, v) = (pair[0], pair[1], pair[2], pair[3]);
            out[..3].copy_from_slice(&yuv_to_bgr(y0, u, v));
            if out.len() == BYTES_PER_PIXEL * 2 {
                out[3..].copy_from_slice(&yuv_to_bgr(y1, u, v));
            }
        }
    }
    true
}

#[inline]
fn yuv_to_bgr(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [clamp(b), clamp(g), clamp(r)]
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Converts RGB24 to BGR24 in place.
pub fn swap_red_blue(data: &mut [u8]) {
    for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_known_formats_and_rejects_the_rest() {
        assert_eq!(decode_route(FourCc::YUY2).unwrap(), DecodeRoute::Yuyv);
        assert_eq!(decode_route(FourCc::MJPG).unwrap(), DecodeRoute::Library);
        assert!(matches!(
            decode_route(FourCc(*b"H264")),
            Err(CaptureError::UnsupportedFormat(f)) if f == FourCc(*b"H264")
        ));
    }

    #[test]
    fn yuyv_white_and_black() {
        // Y=235 is white, Y=16 black, chroma neutral.
        let src = [235, 128, 16, 128];
        let mut frame = Frame::default();
        assert!(yuyv_to_bgr(&src, 2, 1, 4, &mut frame));
        assert_eq!(frame.pixel(0, 0), [255, 255, 255]);
        assert_eq!(frame.pixel(1, 0), [0, 0, 0]);
    }

    #[test]
    fn yuyv_red_lands_in_third_channel() {
        // BT.601 pure red: Y=81 U=90 V=240
        let src = [81, 90, 81, 240];
        let mut frame = Frame::default();
        assert!(yuyv_to_bgr(&src, 2, 1, 4, &mut frame));
        let [b, g, r] = frame.pixel(0, 0);
        assert!(r > 250, "red was {}", r);
        assert!(g < 5 && b < 5, "g={} b={}", g, b);
    }

    #[test]
    fn yuyv_respects_source_stride() {
        // Two rows of one pixel pair, padded to 8 bytes per row.
        let src = [16, 128, 16, 128, 0xAA, 0xAA, 0xAA, 0xAA, 235, 128, 235, 128];
        let mut frame = Frame::default();
        assert!(yuyv_to_bgr(&src, 2, 2, 8, &mut frame));
        assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
        assert_eq!(frame.pixel(1, 1), [255, 255, 255]);
    }

    #[test]
    fn yuyv_rejects_short_input() {
        let mut frame = Frame::default();
        assert!(!yuyv_to_bgr(&[0; 6], 2, 2, 4, &mut frame));
        assert!(!yuyv_to_bgr(&[0; 8], 2, 2, 2, &mut frame));
    }

    #[test]
    fn swap_red_blue_reorders_each_pixel() {
        let mut data = [1, 2, 3, 4, 5, 6];
        swap_red_blue(&mut data);
        assert_eq!(data, [3, 2, 1, 6, 5, 4]);
    }
}
