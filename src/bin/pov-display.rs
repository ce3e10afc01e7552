#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::anyhow;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_sys as _;
    use log::*;

    use pov_cylinder::bsc::{self, board::ArmPins};
    use pov_cylinder::config::{Config, NetworkMode};
    use pov_cylinder::console;
    use pov_cylinder::playback::{Controller, DirLibrary, Session};
    use pov_cylinder::render::SpinPacer;
    use pov_cylinder::storage::{Arena, DirTier};

    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = Config::default();
    info!("Config: {}", serde_json::to_string(&config)?);

    let peripherals = Peripherals::take().ok_or_else(|| anyhow!("peripherals already taken"))?;
    let sysloop = EspSystemEventLoop::take()?;

    bsc::storage::mount_spiffs(&config.storage.base)?;
    let arena = Arc::new(Arena::new(
        config.geometry(),
        config.storage.policy,
        bsc::storage::psram_tier(&config.storage),
        DirTier::new(&config.storage.base),
    ));

    let library = DirLibrary::new(&config.storage.base, &config.playback);
    // SPIFFS is flat, the folders are only name prefixes there
    if let Err(e) = library.ensure_dirs() {
        warn!("Asset folders not created: {}", e);
    }

    let _on_join = if config.network.clear_on_join && config.network.mode != NetworkMode::Station {
        Some(bsc::wifi::clear_on_join(&sysloop, arena.clone())?)
    } else {
        None
    };
    let _wifi = bsc::wifi::start(peripherals.modem, sysloop, &config.network)?;
    let _server = bsc::http::serve(arena.clone(), library.clone(), config.display.frame_bytes())?;

    let (renderer, _pwck) = bsc::board::renderer(ArmPins::new(peripherals.spi2, peripherals.pins))?;
    let pacer = SpinPacer::new(config.display.timing.interval());
    info!("Column interval {:?}", pacer.interval());

    let mut controller = Controller::new(
        renderer,
        pacer,
        library,
        arena,
        &config.display,
        config.playback.clone(),
    );
    if let Err(e) = bsc::board::blocking_console() {
        warn!("UART driver not installed, console polls instead: {}", e);
    }
    let mut input = console::spawn_console()?;
    let mut session = Session::default();

    info!("General Menu: 'c' characters, 'p' pictures, 'v' videos");
    controller.run(&mut session, &mut input);

    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("pov-display only runs on the ESP32; build with the espidf target");
}
