//! ESP32 board support: radio, flash filesystem, LED arm wiring and the
//! upload server.

pub mod board;
pub mod http;
pub mod storage;
pub mod wifi;
