/// Bytes per source pixel (blue, green, red).
pub const BYTES_PER_PIXEL: usize = 3;

/// One captured image in packed BGR24 layout.
///
/// The buffer is reused across captures: `resize` only reallocates when the
/// frame grows, so a ring slot settles at the negotiated capture size.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let mut frame = Self::default();
        frame.resize(width, height);
        frame
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.stride = width as usize * BYTES_PER_PIXEL;
        self.data.resize(self.stride * height as usize, 0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Distance in bytes between the starts of two consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.width as usize * BYTES_PER_PIXEL;
        &mut self.data[start..start + len]
    }

    /// Writes one pixel, silently ignoring coordinates outside the frame.
    pub fn put_pixel(&mut self, x: i32, y: i32, bgr: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        self.data[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&bgr);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn fill(&mut self, bgr: [u8; 3]) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&bgr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_keeps_stride_tight() {
        let mut frame = Frame::new(4, 2);
        assert_eq!(frame.stride(), 12);
        assert_eq!(frame.data().len(), 24);

        frame.resize(2, 2);
        assert_eq!(frame.stride(), 6);
        assert_eq!(frame.data().len(), 12);
        assert_eq!(frame.row(1).len(), 6);
    }

    #[test]
    fn put_pixel_clips_out_of_bounds() {
        let mut frame = Frame::new(2, 2);
        frame.put_pixel(-1, 0, [1, 2, 3]);
        frame.put_pixel(2, 1, [1, 2, 3]);
        frame.put_pixel(1, 1, [9, 8, 7]);
        assert_eq!(frame.pixel(1, 1), [9, 8, 7]);
        assert_eq!(frame.data().iter().filter(|b| **b != 0).count(), 3);
    }

    #[test]
    fn default_frame_is_empty() {
        assert!(Frame::default().is_empty());
        assert!(!Frame::new(1, 1).is_empty());
    }
}
