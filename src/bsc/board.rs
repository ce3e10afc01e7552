use esp_idf_hal::gpio::{
    AnyIOPin, AnyOutputPin, Gpio10, Gpio11, Gpio12, Gpio18, Gpio23, Output, PinDriver, Pins,
};
use esp_idf_hal::spi::{config::Config, Dma, SpiDeviceDriver, SpiDriver, SPI2};
use esp_idf_hal::units::FromValueType;
use esp_idf_sys::{self as sys, esp};
use log::*;

use crate::render::ColumnRenderer;

pub type ArmSpi = SpiDeviceDriver<'static, SpiDriver<'static>>;
pub type Renderer = ColumnRenderer<ArmSpi, PinDriver<'static, Gpio10, Output>, PinDriver<'static, Gpio11, Output>>;

/// Pins feeding the shift registers on the LED arms.
pub struct ArmPins {
    pub spi: SPI2,
    pub sck: Gpio18,
    pub mosi: Gpio23,
    pub le1: Gpio10,
    pub le2: Gpio11,
    pub pwck: Gpio12,
}

/// Column renderer on SPI2 at 1 MHz, mode 0, MSB first. The PWM clock pin is
/// returned as well and must stay alive, it holds the line low.
pub fn renderer(pins: ArmPins) -> anyhow::Result<(Renderer, PinDriver<'static, Gpio12, Output>)> {
    let driver = SpiDriver::new(
        pins.spi,
        pins.sck,
        pins.mosi,
        None::<AnyIOPin>,
        Dma::Disabled,
    )?;
    let config = Config::new().baudrate(1.MHz().into());
    let spi = SpiDeviceDriver::new(driver, None::<AnyOutputPin>, &config)?;

    let mut pwck = PinDriver::output(pins.pwck)?;
    pwck.set_low()?;

    let le1 = PinDriver::output(pins.le1)?;
    let le2 = PinDriver::output(pins.le2)?;
    let renderer = ColumnRenderer::new(spi, le1, le2)?;

    info!("LED arms ready on SPI2 (SCK 18, MOSI 23, LE 10/11)");
    Ok((renderer, pwck))
}

impl ArmPins {
    pub fn new(spi: SPI2, pins: Pins) -> Self {
        Self {
            spi,
            sck: pins.gpio18,
            mosi: pins.gpio23,
            le1: pins.gpio10,
            le2: pins.gpio11,
            pwck: pins.gpio12,
        }
    }
}

/// Puts the UART0 driver behind stdin so console reads block instead of
/// failing whenever the FIFO is empty.
pub fn blocking_console() -> anyhow::Result<()> {
    esp!(unsafe { sys::uart_driver_install(0, 256, 0, 0, std::ptr::null_mut(), 0) })?;
    unsafe { sys::esp_vfs_dev_uart_use_driver(0) };
    Ok(())
}
