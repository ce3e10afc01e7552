use std::fmt::Debug;

use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;
use rgb::RGB8;
use thiserror::Error;

use super::mapping::{ColumnWords, WIRE_WORDS};

/// Which of the two latch rails commits a column. Only `Primary` is wired
/// on the current arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latch {
    Primary,
    Secondary,
}

#[derive(Debug, Error)]
pub enum RenderError<S: Debug, P: Debug> {
    #[error("spi transfer failed: {0:?}")]
    Spi(S),
    #[error("latch pin failed: {0:?}")]
    Pin(P),
}

/// Anything that can put one column on the LEDs.
pub trait ColumnSink {
    type Error: Debug;

    fn emit(&mut self, column: &[RGB8], latch: Latch) -> Result<(), Self::Error>;
}

/// Drives the four shift-register groups over one SPI data line and two
/// latch-enable pins.
pub struct ColumnRenderer<SPI, LE1, LE2> {
    spi: SPI,
    le1: LE1,
    le2: LE2,
    words: ColumnWords,
    wire: Vec<u8>,
}

impl<SPI, LE1, LE2, PinE> ColumnRenderer<SPI, LE1, LE2>
where
    SPI: spi::Write<u8>,
    SPI::Error: Debug,
    LE1: OutputPin<Error = PinE>,
    LE2: OutputPin<Error = PinE>,
    PinE: Debug,
{
    pub fn new(spi: SPI, mut le1: LE1, mut le2: LE2) -> Result<Self, RenderError<SPI::Error, PinE>> {
        le1.set_low().map_err(RenderError::Pin)?;
        le2.set_low().map_err(RenderError::Pin)?;
        Ok(Self {
            spi,
            le1,
            le2,
            words: ColumnWords::default(),
            wire: Vec::with_capacity(WIRE_WORDS * 2),
        })
    }

    /// Words packed for the most recent column.
    pub fn words(&self) -> &ColumnWords {
        &self.words
    }

    pub fn release(self) -> (SPI, LE1, LE2) {
        (self.spi, self.le1, self.le2)
    }

    pub fn show(&mut self, column: &[RGB8], latch: Latch) -> Result<(), RenderError<SPI::Error, PinE>> {
        self.words.pack(column);
        self.words.write_wire(&mut self.wire);

        // blank the previous column before shifting in the next one
        self.le1.set_low().map_err(RenderError::Pin)?;
        self.le2.set_low().map_err(RenderError::Pin)?;

        self.spi.write(&self.wire).map_err(RenderError::Spi)?;

        match latch {
            Latch::Primary => pulse(&mut self.le1),
            Latch::Secondary => pulse(&mut self.le2),
        }
        .map_err(RenderError::Pin)
    }
}

fn pulse<P: OutputPin>(pin: &mut P) -> Result<(), P::Error> {
    pin.set_high()?;
    pin.set_low()
}

impl<SPI, LE1, LE2, PinE> ColumnSink for ColumnRenderer<SPI, LE1, LE2>
where
    SPI: spi::Write<u8>,
    SPI::Error: Debug,
    LE1: OutputPin<Error = PinE>,
    LE2: OutputPin<Error = PinE>,
    PinE: Debug,
{
    type Error = RenderError<SPI::Error, PinE>;

    fn emit(&mut self, column: &[RGB8], latch: Latch) -> Result<(), Self::Error> {
        self.show(column, latch)
    }
}
