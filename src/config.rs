use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::render::ColumnTiming;
use crate::storage::{CursorPolicy, Geometry};

/// Columns round the cylinder.
pub const WIDTH: usize = 314;
/// LEDs per column, top to bottom.
pub const HEIGHT: usize = 186;

// first 30 slots are PSRAM blocks, the next 30 are SPIFFS files
pub const FAST_SLOTS: usize = 30;
pub const SLOW_SLOTS: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct DisplayConfig {
    pub width: usize,
    pub height: usize,
    pub timing: ColumnTiming,
}

impl DisplayConfig {
    /// Bytes in one full frame, which is also the size of every arena slot.
    pub fn frame_bytes(&self) -> usize {
        self.width * self.height * 3
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            timing: ColumnTiming::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    pub fast_slots: usize,
    pub slow_slots: usize,
    pub policy: CursorPolicy,
    /// Upper bound on live PSRAM blocks, `None` to allocate until the heap says no.
    pub fast_block_limit: Option<usize>,
    /// Mount point of the SPIFFS partition; slow slots and asset folders live below it.
    pub base: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            fast_slots: FAST_SLOTS,
            slow_slots: SLOW_SLOTS,
            policy: CursorPolicy::FastRing,
            fast_block_limit: None,
            base: PathBuf::from("/spiffs"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackConfig {
    /// Sleep between polls while video playback is paused.
    pub idle: Duration,
    /// Columns the rotating-text submode advances per render.
    pub rotate_step: usize,
    pub characters_dir: String,
    pub pictures_dir: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(300),
            rotate_step: 4,
            characters_dir: "char".into(),
            pictures_dir: "img".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkMode {
    AccessPoint,
    Station,
    Mixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkConfig {
    pub mode: NetworkMode,
    pub ssid: String,
    #[serde(skip)]
    pub password: String,
    /// Drop every stored frame when a client joins the access point, so each
    /// uploading session starts from an empty arena.
    pub clear_on_join: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let mode = match option_env!("POV_WIFI_MODE") {
            Some("sta") => NetworkMode::Station,
            Some("mixed") => NetworkMode::Mixed,
            _ => NetworkMode::AccessPoint,
        };
        Self {
            mode,
            ssid: option_env!("POV_WIFI_SSID").unwrap_or("ESP32-Access-Point").into(),
            password: option_env!("POV_WIFI_PASS").unwrap_or("12345678").into(),
            clear_on_join: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub display: DisplayConfig,
    pub storage: StorageConfig,
    pub playback: PlaybackConfig,
    pub network: NetworkConfig,
}

impl Config {
    /// Arena layout: one frame per slot.
    pub fn geometry(&self) -> Geometry {
        Geometry {
            block_size: self.display.frame_bytes(),
            fast_slots: self.storage.fast_slots,
            slow_slots: self.storage.slow_slots,
        }
    }
}
