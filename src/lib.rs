pub mod config;
pub mod console;
pub mod frame;
pub mod ingest;
pub mod playback;
pub mod render;
pub mod storage;

#[cfg(target_os = "espidf")]
pub mod bsc;
