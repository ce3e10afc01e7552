pub use rgb::RGB8;
use rgb::FromSlice;

/// A full picture for the cylinder, stored column-major.
///
/// The byte layout is the one used by asset files and arena slots:
/// `r, g, b` per pixel, `height` pixels per column, column 0 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// An all-dark frame.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Takes ownership of raw frame bytes, which must be exactly one frame long.
    pub fn from_bytes(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != width * height * 3 {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw view for loaders that fill the frame in place.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn column(&self, index: usize) -> &[RGB8] {
        let stride = self.height * 3;
        self.data[index * stride..(index + 1) * stride].as_rgb()
    }

    pub fn column_mut(&mut self, index: usize) -> &mut [RGB8] {
        let stride = self.height * 3;
        self.data[index * stride..(index + 1) * stride].as_rgb_mut()
    }

    pub fn set(&mut self, column: usize, row: usize, color: RGB8) {
        self.column_mut(column)[row] = color;
    }

    pub fn fill(&mut self, color: RGB8) {
        for px in self.data.as_rgb_mut() {
            *px = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_contiguous_in_the_byte_layout() {
        let mut frame = FrameBuffer::blank(3, 2);
        frame.set(1, 1, RGB8::new(1, 2, 3));
        // column 1 starts at byte 6, row 1 is the second pixel of it
        assert_eq!(&frame.as_bytes()[9..12], &[1, 2, 3]);
        assert_eq!(frame.column(1), &[RGB8::new(0, 0, 0), RGB8::new(1, 2, 3)]);
    }

    #[test]
    fn from_bytes_rejects_short_frames() {
        assert!(FrameBuffer::from_bytes(2, 2, vec![0; 11]).is_none());
        assert!(FrameBuffer::from_bytes(2, 2, vec![0; 12]).is_some());
    }

    #[test]
    fn fill_and_clear() {
        let mut frame = FrameBuffer::blank(2, 2);
        frame.fill(RGB8::new(9, 9, 9));
        assert!(frame.as_bytes().iter().all(|b| *b == 9));
        frame.clear();
        assert!(frame.as_bytes().iter().all(|b| *b == 0));
    }
}
