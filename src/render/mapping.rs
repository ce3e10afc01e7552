//! Column to shift-register wiring of the cylinder arms.
//!
//! 35 sixteen-channel chips are chained in four groups: 12 chips in group 1,
//! 11 each in groups 2 and 3, and a partial chip in group 4 covering the
//! bottom of the column. Within a chip channel 15 is the physical top and
//! channel 0 the bottom. Each channel word carries the 8-bit intensity in its
//! high byte; the chips clock 16 bits per channel.

use rgb::RGB8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    R,
    G,
    B,
}

/// One chip channel: 1-based pixel offset within a 16-pixel stride, and colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tap {
    pub pixel: usize,
    pub color: Color,
}

const fn tap(pixel: usize, color: Color) -> Tap {
    Tap { pixel, color }
}

use Color::{B, G, R};

pub const GROUP1_UNITS: usize = 12;
pub const GROUP2_UNITS: usize = 11;
pub const GROUP3_UNITS: usize = 11;
/// Channels of the partial group-4 chip that are actually wired.
pub const GROUP4_ACTIVE: usize = 10;
/// Group 4 starts after the eleven full 16-pixel strides.
pub const GROUP4_BASE: usize = 176;

#[rustfmt::skip]
pub const GROUP1: [Tap; 16] = [
    tap(1, G), tap(1, R), tap(2, R), tap(2, G),
    tap(1, B), tap(2, B), tap(3, G), tap(3, B),
    tap(4, B), tap(5, B), tap(5, R), tap(6, G),
    tap(5, G), tap(4, R), tap(4, G), tap(3, R),
];

#[rustfmt::skip]
pub const GROUP2: [Tap; 16] = [
    tap(8, R), tap(8, G), tap(7, G), tap(6, R),
    tap(6, B), tap(7, B), tap(7, R), tap(8, B),
    tap(9, B), tap(10, B), tap(11, B), tap(10, R),
    tap(11, G), tap(10, G), tap(9, R), tap(9, G),
];

#[rustfmt::skip]
pub const GROUP3: [Tap; 16] = [
    tap(11, R), tap(13, R), tap(13, G), tap(12, G),
    tap(12, B), tap(12, R), tap(13, B), tap(14, B),
    tap(14, R), tap(15, B), tap(16, B), tap(15, R),
    tap(16, G), tap(16, R), tap(15, G), tap(14, G),
];

#[rustfmt::skip]
pub const GROUP4: [Tap; 16] = [
    tap(9, G), tap(11, R), tap(10, G), tap(10, R),
    tap(11, B), tap(10, B), tap(9, B), tap(8, B),
    tap(8, R), tap(7, B), tap(6, B), tap(7, R),
    tap(7, G), tap(8, G), tap(9, R), tap(6, G),
];

/// Words shifted out per column.
pub const WIRE_WORDS: usize = 11 * 3 * 16 + 16 + GROUP4_ACTIVE;

pub type Unit = [u16; 16];

/// Intensity word for `tap` in the stride starting at `base + 16 * unit`.
/// Taps that fall past the end of the column are dark.
#[inline]
fn word(column: &[RGB8], base: usize, unit: usize, tap: Tap) -> u16 {
    let Some(px) = column.get(base + tap.pixel + 16 * unit - 1) else {
        return 0;
    };
    let level = match tap.color {
        Color::R => px.r,
        Color::G => px.g,
        Color::B => px.b,
    };
    (level as u16) << 8
}

fn fill_unit(unit_words: &mut Unit, table: &[Tap; 16], column: &[RGB8], base: usize, unit: usize) {
    for (slot, tap) in unit_words.iter_mut().zip(table) {
        *slot = word(column, base, unit, *tap);
    }
}

/// Per-chip channel words for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnWords {
    pub group1: [Unit; GROUP1_UNITS],
    pub group2: [Unit; GROUP2_UNITS],
    pub group3: [Unit; GROUP3_UNITS],
    pub group4: Unit,
}

impl Default for ColumnWords {
    fn default() -> Self {
        Self {
            group1: [[0; 16]; GROUP1_UNITS],
            group2: [[0; 16]; GROUP2_UNITS],
            group3: [[0; 16]; GROUP3_UNITS],
            group4: [0; 16],
        }
    }
}

impl ColumnWords {
    pub fn pack(&mut self, column: &[RGB8]) {
        for (unit, words) in self.group1.iter_mut().enumerate() {
            fill_unit(words, &GROUP1, column, 0, unit);
        }
        for (unit, words) in self.group2.iter_mut().enumerate() {
            fill_unit(words, &GROUP2, column, 0, unit);
        }
        for (unit, words) in self.group3.iter_mut().enumerate() {
            fill_unit(words, &GROUP3, column, 0, unit);
        }
        fill_unit(&mut self.group4, &GROUP4, column, GROUP4_BASE, 0);
    }

    pub fn packed(column: &[RGB8]) -> Self {
        let mut words = Self::default();
        words.pack(column);
        words
    }

    /// Words in the order they go out on the wire: the first eleven units of
    /// groups 1..3 interleaved, then group 1's last unit, then group 4.
    pub fn wire_order(&self) -> impl Iterator<Item = u16> + '_ {
        (0..GROUP2_UNITS)
            .flat_map(move |unit| {
                self.group1[unit]
                    .iter()
                    .chain(&self.group2[unit])
                    .chain(&self.group3[unit])
            })
            .chain(&self.group1[GROUP1_UNITS - 1])
            .chain(&self.group4[..GROUP4_ACTIVE])
            .copied()
    }

    /// Wire order serialised MSB first, two bytes per word.
    pub fn write_wire(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(WIRE_WORDS * 2);
        for word in self.wire_order() {
            out.extend_from_slice(&word.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEIGHT: usize = 186;

    fn column_with(index: usize, px: RGB8) -> Vec<RGB8> {
        let mut column = vec![RGB8::default(); HEIGHT];
        column[index] = px;
        column
    }

    #[test]
    fn dark_column_emits_only_zero_words() {
        let words = ColumnWords::packed(&vec![RGB8::default(); HEIGHT]);
        let wire: Vec<u16> = words.wire_order().collect();
        assert_eq!(wire.len(), WIRE_WORDS);
        assert!(wire.iter().all(|w| *w == 0));
    }

    #[test]
    fn top_pixel_red_lands_on_one_channel() {
        let words = ColumnWords::packed(&column_with(0, RGB8::new(255, 0, 0)));
        let wire: Vec<u16> = words.wire_order().collect();

        let lit: Vec<usize> = wire
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0)
            .map(|(i, _)| i)
            .collect();
        // group 1, unit 0, channel 1 is pixel 1 red
        assert_eq!(lit, vec![1]);
        assert_eq!(wire[1], 0xFF00);
        assert_eq!(words.group1[0][1], 0xFF00);
    }

    #[test]
    fn low_byte_is_always_zero() {
        let column: Vec<RGB8> = (0..HEIGHT)
            .map(|i| RGB8::new(i as u8, 255 - i as u8, 0x5a))
            .collect();
        let words = ColumnWords::packed(&column);
        assert!(words.wire_order().all(|w| w & 0x00ff == 0));
    }

    #[test]
    fn shared_pixels_split_across_groups() {
        // pixel 6 green sits in group 1, its red and blue in group 2
        let words = ColumnWords::packed(&column_with(5, RGB8::new(1, 2, 3)));
        assert_eq!(words.group1[0][11], 2 << 8);
        assert_eq!(words.group2[0][3], 1 << 8);
        assert_eq!(words.group2[0][4], 3 << 8);

        // pixel 11 blue and green in group 2, red in group 3
        let words = ColumnWords::packed(&column_with(10, RGB8::new(4, 5, 6)));
        assert_eq!(words.group2[0][10], 6 << 8);
        assert_eq!(words.group2[0][12], 5 << 8);
        assert_eq!(words.group3[0][0], 4 << 8);
    }

    #[test]
    fn units_step_sixteen_pixels() {
        // pixel 1 of the third stride is column index 32
        let words = ColumnWords::packed(&column_with(32, RGB8::new(0, 0, 200)));
        assert_eq!(words.group1[2][4], 200 << 8);
        assert_eq!(words.group1[0][4], 0);
    }

    #[test]
    fn every_channel_of_a_full_stride_is_wired_once() {
        let mut seen = std::collections::HashSet::new();
        for table in [&GROUP1, &GROUP2, &GROUP3] {
            for t in table.iter() {
                seen.insert((t.pixel, t.color as u8));
            }
        }
        // 16 pixels x 3 colours, pixels 6 and 11 shared between groups
        assert_eq!(seen.len(), 48);
    }

    #[test]
    fn group4_reads_the_bottom_of_the_column() {
        // group 4 channel 0 is pixel 176 + 9, green
        let words = ColumnWords::packed(&column_with(184, RGB8::new(0, 77, 0)));
        assert_eq!(words.group4[0], 77 << 8);
        let wire: Vec<u16> = words.wire_order().collect();
        assert_eq!(wire[WIRE_WORDS - GROUP4_ACTIVE], 77 << 8);
    }

    #[test]
    fn taps_past_the_column_end_are_dark() {
        let column = vec![RGB8::new(255, 255, 255); HEIGHT];
        let words = ColumnWords::packed(&column);
        // channel 1 is pixel 176 + 11 - 1 = 186, one past the last LED
        assert_eq!(words.group4[1], 0);
        assert_eq!(words.group4[0], 0xFF00);
    }

    #[test]
    fn wire_bytes_are_big_endian() {
        let words = ColumnWords::packed(&column_with(0, RGB8::new(0xAB, 0, 0)));
        let mut wire = Vec::new();
        words.write_wire(&mut wire);
        assert_eq!(wire.len(), WIRE_WORDS * 2);
        assert_eq!(&wire[2..4], &[0xAB, 0x00]);
    }
}
