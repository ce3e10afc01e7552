use std::ffi::CString;
use std::path::Path;

use anyhow::{anyhow, Context};
use esp_idf_sys::{self as sys, esp};
use log::*;

use crate::config::StorageConfig;
use crate::storage::HeapTier;

/// Registers the `spiffs` partition under `base`, formatting it if it does
/// not mount.
pub fn mount_spiffs(base: &Path) -> anyhow::Result<()> {
    let base_path = base
        .to_str()
        .ok_or_else(|| anyhow!("mount point {} is not valid UTF-8", base.display()))?;
    let base_path = CString::new(base_path).context("mount point contains a NUL byte")?;

    let conf = sys::esp_vfs_spiffs_conf_t {
        base_path: base_path.as_ptr(),
        partition_label: std::ptr::null(),
        max_files: 8,
        format_if_mount_failed: true,
    };
    esp!(unsafe { sys::esp_vfs_spiffs_register(&conf) }).context("SPIFFS mount failed")?;

    let mut total = 0;
    let mut used = 0;
    if esp!(unsafe { sys::esp_spiffs_info(std::ptr::null(), &mut total, &mut used) }).is_ok() {
        info!("SPIFFS mounted at {}: {} of {} bytes used", base.display(), used, total);
    }
    Ok(())
}

pub fn psram_present() -> bool {
    unsafe { sys::heap_caps_get_total_size(sys::MALLOC_CAP_SPIRAM) > 0 }
}

/// The fast tier. With `CONFIG_SPIRAM_USE_MALLOC` frame-sized allocations
/// land in PSRAM, so the ordinary heap is enough.
pub fn psram_tier(config: &StorageConfig) -> HeapTier {
    let present = psram_present();
    if present {
        let free = unsafe { sys::heap_caps_get_free_size(sys::MALLOC_CAP_SPIRAM) };
        info!("PSRAM available, {} bytes free", free);
    } else {
        warn!("No PSRAM found, every frame goes to flash");
    }
    match config.fast_block_limit {
        Some(limit) => HeapTier::with_limit(present, limit),
        None => HeapTier::new(present),
    }
}
