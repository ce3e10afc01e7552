//! Turning frames into shift-register traffic.

pub mod column;
pub mod mapping;
pub mod pacing;

pub use column::{ColumnRenderer, ColumnSink, Latch, RenderError};
pub use mapping::ColumnWords;
pub use pacing::{ColumnTiming, NoPacing, Pacer, SpinPacer};

use crate::frame::FrameBuffer;

/// Emits every column of `frame` once, starting `offset` columns round the
/// cylinder, on the primary latch.
pub fn render_frame<S: ColumnSink, P: Pacer>(
    sink: &mut S,
    pacer: &mut P,
    frame: &FrameBuffer,
    offset: usize,
) -> Result<(), S::Error> {
    let width = frame.width();
    if width == 0 {
        return Ok(());
    }
    pacer.start_frame();
    for i in 0..width {
        sink.emit(frame.column((offset + i) % width), Latch::Primary)?;
        pacer.wait_column();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use rgb::RGB8;

    use super::*;

    #[derive(Default)]
    struct FirstPixels(Vec<u8>);

    impl ColumnSink for FirstPixels {
        type Error = Infallible;

        fn emit(&mut self, column: &[RGB8], latch: Latch) -> Result<(), Infallible> {
            assert_eq!(latch, Latch::Primary);
            self.0.push(column[0].r);
            Ok(())
        }
    }

    fn numbered(width: usize) -> FrameBuffer {
        let mut frame = FrameBuffer::blank(width, 2);
        for c in 0..width {
            frame.set(c, 0, RGB8::new(c as u8, 0, 0));
        }
        frame
    }

    #[test]
    fn every_column_once_in_order() {
        let mut sink = FirstPixels::default();
        render_frame(&mut sink, &mut NoPacing, &numbered(4), 0).unwrap();
        assert_eq!(sink.0, vec![0, 1, 2, 3]);
    }

    #[test]
    fn offset_rotates_the_start_column() {
        let mut sink = FirstPixels::default();
        render_frame(&mut sink, &mut NoPacing, &numbered(4), 6).unwrap();
        assert_eq!(sink.0, vec![2, 3, 0, 1]);
    }
}
