//! LaserTrace Settings Crate
//!
//! Bench configuration: device addresses, calibration constants, burn
//! parameters and file locations.

pub mod config;
pub mod error;

pub use config::{
    BurnSettings, CalibrationSettings, CameraSettings, Config, GalvoSettings, LaserSettings,
    PathSettings, StageSettings, VisionSettings, MIN_ANGLE_PER_STEP,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
