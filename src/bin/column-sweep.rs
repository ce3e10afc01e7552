//! Bring-up check for the LED arms: fades every channel up and down.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use anyhow::anyhow;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_sys as _;
    use log::*;

    use pov_cylinder::bsc::board::{self, ArmPins};
    use pov_cylinder::config::DisplayConfig;
    use pov_cylinder::frame::{FrameBuffer, RGB8};
    use pov_cylinder::render::{render_frame, SpinPacer};

    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = Peripherals::take().ok_or_else(|| anyhow!("peripherals already taken"))?;
    let (mut renderer, _pwck) = board::renderer(ArmPins::new(peripherals.spi2, peripherals.pins))?;

    let display = DisplayConfig::default();
    let mut pacer = SpinPacer::new(display.timing.interval());
    let mut frame = FrameBuffer::blank(display.width, display.height);

    let mut level = 0u8;
    let mut rising = true;
    loop {
        if rising {
            level += 1;
            if level == 200 {
                rising = false;
            }
        } else {
            level -= 1;
            if level == 0 {
                rising = true;
            }
        }

        frame.fill(RGB8::new(level, level, level));
        render_frame(&mut renderer, &mut pacer, &frame, 0)?;
        if level % 50 == 0 {
            debug!("level {}", level);
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("column-sweep drives real hardware; build with the espidf target");
}
