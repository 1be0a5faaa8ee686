//! Burns the status line into a captured frame.
//!
//! A 5x7 bitmap font scaled up by an integer factor. Text is drawn over an
//! opaque backing box, so redrawing onto a frame that already carries an older
//! status line leaves no residue.

use crate::frame::Frame;

const GLYPH_W: i32 = 5;
const GLYPH_H: i32 = 7;
const SCALE: i32 = 2;
const ADVANCE: i32 = (GLYPH_W + 1) * SCALE;
const INSET: i32 = 20;
const PADDING: i32 = 4;

// BGR
const TEXT_COLOR: [u8; 3] = [160, 160, 160];
const BOX_COLOR: [u8; 3] = [16, 16, 16];

pub fn status_line(fps: f64, codec: &str, vsync_enabled: bool) -> String {
    let fps = if fps.is_finite() { fps.max(0.0) as u64 } else { 0 };
    let vsync = if vsync_enabled { "VSync ON" } else { "VSync OFF" };
    format!("FPS: {} | {} | {}", fps, codec, vsync)
}

/// Pixel rectangle (x, y, width, height) the status text occupies for a frame
/// of the given height.
pub fn text_bounds(text: &str, frame_height: u32) -> (i32, i32, i32, i32) {
    let chars = text.chars().count() as i32;
    let width = (chars * ADVANCE - SCALE).max(0);
    let height = GLYPH_H * SCALE;
    let baseline = frame_height as i32 - INSET;
    (INSET, baseline - height, width, height)
}

/// Draws `text` at the bottom-left corner of `frame`, clipped to the frame.
pub fn burn_status(frame: &mut Frame, text: &str) {
    if frame.is_empty() {
        return;
    }

    let (x0, y0, w, h) = text_bounds(text, frame.height());
    fill_rect(frame, x0 - PADDING, y0 - PADDING, w + 2 * PADDING, h + 2 * PADDING, BOX_COLOR);

    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = glyph(ch) else {
            continue;
        };
        let gx = x0 + i as i32 * ADVANCE;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) != 0 {
                    fill_rect(
                        frame,
                        gx + col * SCALE,
                        y0 + row as i32 * SCALE,
                        SCALE,
                        SCALE,
                        TEXT_COLOR,
                    );
                }
            }
        }
    }
}

fn fill_rect(frame: &mut Frame, x: i32, y: i32, w: i32, h: i32, bgr: [u8; 3]) {
    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + w).min(frame.width() as i32);
    let y_end = (y + h).min(frame.height() as i32);
    for py in y_start..y_end {
        for px in x_start..x_end {
            frame.put_pixel(px, py, bgr);
        }
    }
}

fn glyph(ch: char) -> Option<&'static [u8; 7]> {
    let rows: &'static [u8; 7] = match ch.to_ascii_uppercase() {
        '0' => &[0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => &[0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => &[0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => &[0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => &[0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => &[0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => &[0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => &[0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => &[0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => &[0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => &[0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => &[0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => &[0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => &[0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => &[0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => &[0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => &[0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => &[0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => &[0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => &[0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => &[0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => &[0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => &[0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => &[0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => &[0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => &[0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => &[0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => &[0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => &[0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => &[0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => &[0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => &[0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => &[0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => &[0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => &[0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => &[0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        ':' => &[0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '|' => &[0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        '.' => &[0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => &[0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '?' => &[0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_format() {
        assert_eq!(status_line(59.94, "YUY2", false), "FPS: 59 | YUY2 | VSync OFF");
        assert_eq!(status_line(f64::INFINITY, "MJPG", true), "FPS: 0 | MJPG | VSync ON");
    }

    #[test]
    fn burn_draws_text_inside_backing_box() {
        let mut frame = Frame::new(400, 100);
        frame.fill([255, 255, 255]);
        let text = "FPS: 60";
        burn_status(&mut frame, text);

        let (x, y, w, h) = text_bounds(text, 100);
        assert_eq!((x, y), (20, 66));

        // Top-left of the 'F' is lit.
        assert_eq!(frame.pixel(x as u32, y as u32), TEXT_COLOR);
        // Padding around the text is the box color.
        assert_eq!(frame.pixel((x - 2) as u32, (y - 2) as u32), BOX_COLOR);
        // Outside the box the frame is untouched.
        assert_eq!(frame.pixel((x + w + PADDING + 1) as u32, (y + h / 2) as u32), [255, 255, 255]);
        assert_eq!(frame.pixel(0, 0), [255, 255, 255]);
    }

    #[test]
    fn redrawing_replaces_previous_text() {
        let mut once = Frame::new(300, 60);
        burn_status(&mut once, "FPS: 120");

        let mut twice = Frame::new(300, 60);
        burn_status(&mut twice, "FPS: 888");
        burn_status(&mut twice, "FPS: 120");

        assert_eq!(once.data(), twice.data());
    }

    #[test]
    fn tiny_frames_are_clipped() {
        let mut frame = Frame::new(8, 8);
        burn_status(&mut frame, "FPS: 1 | YUY2 | VSync OFF");
        let mut empty = Frame::default();
        burn_status(&mut empty, "FPS: 1");
    }
}
