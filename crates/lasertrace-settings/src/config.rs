//! Bench configuration
//!
//! Supports JSON and TOML files. Every section falls back to the values of
//! the reference rig, so a config file only needs the keys that differ.
//!
//! Sections:
//! - Galvo controllers (hosts, command port, settle delay, voltage envelope)
//! - Laser enable line
//! - Rotary stage (serial port, Galil axis parameters)
//! - Cameras (capture program and devices)
//! - Vision (segmentation thresholds)
//! - Calibration (scan geometry, calibration factors, centroid shift)
//! - Burn (rotation step, slicing, reconstruction frame)
//! - Paths (calibration record, centroid sets, artifacts, frame folders)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Galvo controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalvoSettings {
    /// X mirror controller host
    pub x_host: String,
    /// Y mirror controller host
    pub y_host: String,
    /// Command port on both controllers
    pub port: u16,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Delay after every mirror command in milliseconds
    pub settle_ms: u64,
    /// Absolute voltage envelope
    pub max_voltage: f64,
}

impl Default for GalvoSettings {
    fn default() -> Self {
        Self {
            x_host: "192.168.0.11".to_string(),
            y_host: "192.168.1.10".to_string(),
            port: 10001,
            connect_timeout_ms: 3000,
            settle_ms: 5,
            max_voltage: 10.0,
        }
    }
}

/// Laser enable line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserSettings {
    /// GPIO value file driving the laser enable input
    pub gpio_value_path: PathBuf,
}

impl Default for LaserSettings {
    fn default() -> Self {
        Self {
            gpio_value_path: PathBuf::from("/sys/class/gpio/gpio0/value"),
        }
    }
}

/// Rotary stage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Serial port of the motion controller
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Timeout for a single response line in milliseconds
    pub read_timeout_ms: u64,
    /// Upper bound for one complete move in milliseconds
    pub move_timeout_ms: u64,
    /// Motor steps per degree
    pub steps_per_degree: f64,
    /// Slew speed in steps/s
    pub speed: u32,
    /// Acceleration in steps/s²
    pub accel: u32,
    /// Deceleration in steps/s²
    pub decel: u32,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            read_timeout_ms: 2000,
            move_timeout_ms: 120_000,
            steps_per_degree: 12800.0,
            speed: 60000,
            accel: 5000,
            decel: 5000,
        }
    }
}

/// Camera settings
///
/// Frames are grabbed by running `program` with `args`; `{device}` and
/// `{output}` are substituted per capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub program: String,
    pub args: Vec<String>,
    /// Camera facing the laser side of the plate
    pub laser_device: String,
    /// Camera used for the pixel to voltage correspondence and tomography
    pub reference_device: String,
    /// Scratch directory for captured files
    pub scratch_dir: PathBuf,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            program: "fswebcam".to_string(),
            args: ["-d", "{device}", "--no-banner", "-r", "640x480", "{output}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            laser_device: "/dev/video2".to_string(),
            reference_device: "/dev/video0".to_string(),
            scratch_dir: std::env::temp_dir().join("lasertrace"),
        }
    }
}

/// Segmentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Luma above which a pixel belongs to a target
    pub threshold: u8,
    /// Minimum target area in pixels
    pub min_area: usize,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            threshold: 200,
            min_area: 20,
        }
    }
}

/// Calibration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Volts per physical unit on X
    pub cal_x: f64,
    /// Volts per physical unit on Y
    pub cal_y: f64,
    /// Diagonal sweep half-widths, smallest first
    pub half_widths: Vec<u32>,
    /// Region whose width is divided into `steps` samples
    pub region_size: f64,
    /// Diagonal sweep length
    pub sweep_length: f64,
    /// Samples per region width
    pub steps: u32,
    /// Side of the local raster
    pub local_line_width: f64,
    /// Brightness at or above which a sample counts as saturated
    pub saturation: f64,
    /// Pause between calibration cells in milliseconds
    pub cell_pause_ms: u64,
    /// Offset between laser camera and reference camera centroids
    pub centroid_shift: [f64; 2],
    /// Stage alignment increments on each side of the start angle
    pub align_increments: u32,
    /// Stage alignment increment in degrees
    pub align_step_deg: f64,
    /// Dwell per cell when verifying a grid in milliseconds
    pub verify_dwell_ms: u64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            cal_x: 20.0 / (113.41 + 114.21),
            cal_y: 20.0 / (153.02 + 154.22),
            half_widths: vec![2, 3, 4, 5, 6, 7, 8],
            region_size: 10.0,
            sweep_length: 15.0,
            steps: 10,
            local_line_width: 15.0,
            saturation: 254.0,
            cell_pause_ms: 2000,
            centroid_shift: [130.0, 65.0],
            align_increments: 50,
            align_step_deg: 0.15,
            verify_dwell_ms: 3000,
        }
    }
}

/// Burn settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnSettings {
    /// Stage rotation between passes in degrees
    pub angle_per_step: f64,
    /// Number of z-levels per pass
    pub num_slices: usize,
    /// Z distance within which a point belongs to a level
    pub tolerance: f64,
    /// Stage move that turns the tumour towards the laser
    pub laser_face_offset: f64,
    /// Height of the reconstruction images in pixels
    pub image_height: f64,
}

impl Default for BurnSettings {
    fn default() -> Self {
        Self {
            angle_per_step: 36.0,
            num_slices: 15,
            tolerance: 20.0,
            laser_face_offset: 89.0,
            image_height: 209.0,
        }
    }
}

/// File locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub calibration_record: PathBuf,
    pub reference_centroids: PathBuf,
    pub coordinates: PathBuf,
    pub center: PathBuf,
    /// Optional dry-run plan output
    pub burn_plan: PathBuf,
    pub calibration_frames: PathBuf,
    pub tomography_frames: PathBuf,
    /// External reconstruction command, run by `generate-model`
    pub reconstruction_command: Vec<String>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            calibration_record: PathBuf::from("data/calibration_data.json"),
            reference_centroids: PathBuf::from("data/centroids_data.json"),
            coordinates: PathBuf::from("data/coordinates.json"),
            center: PathBuf::from("data/center.json"),
            burn_plan: PathBuf::from("data/burn_plan.json"),
            calibration_frames: PathBuf::from("images/calibration"),
            tomography_frames: PathBuf::from("images/reconstruction"),
            reconstruction_command: Vec::new(),
        }
    }
}

/// Complete bench configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub galvo: GalvoSettings,
    pub laser: LaserSettings,
    pub stage: StageSettings,
    pub cameras: CameraSettings,
    pub vision: VisionSettings,
    pub calibration: CalibrationSettings,
    pub burn: BurnSettings,
    pub paths: PathSettings,
}

/// Smallest accepted `burn.angle_per_step`, degrees
pub const MIN_ANGLE_PER_STEP: f64 = 1.0;

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/lasertrace/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("lasertrace").join("config.toml"))
            .ok_or_else(|| {
                ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string()).into()
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        // Galvo
        if self.galvo.x_host.trim().is_empty() || self.galvo.y_host.trim().is_empty() {
            return Err(SettingsError::invalid("galvo.host", "host must not be empty"));
        }
        if self.galvo.port == 0 {
            return Err(SettingsError::invalid("galvo.port", "must be > 0"));
        }
        if !positive(self.galvo.max_voltage) {
            return Err(SettingsError::invalid("galvo.max_voltage", "must be > 0"));
        }

        // Stage
        if self.stage.baud_rate == 0 {
            return Err(SettingsError::invalid("stage.baud_rate", "must be > 0"));
        }
        if self.stage.move_timeout_ms == 0 || self.stage.read_timeout_ms == 0 {
            return Err(SettingsError::invalid("stage.timeout", "must be > 0"));
        }
        if !positive(self.stage.steps_per_degree) {
            return Err(SettingsError::invalid("stage.steps_per_degree", "must be > 0"));
        }

        // Calibration
        let cal = &self.calibration;
        if !positive(cal.cal_x) || !positive(cal.cal_y) {
            return Err(SettingsError::invalid(
                "calibration.cal_x/cal_y",
                "calibration factors must be > 0",
            ));
        }
        if cal.steps == 0 {
            return Err(SettingsError::invalid("calibration.steps", "must be > 0"));
        }
        if cal.half_widths.is_empty() {
            return Err(SettingsError::invalid(
                "calibration.half_widths",
                "at least one half-width is required",
            ));
        }
        if cal.half_widths.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SettingsError::invalid(
                "calibration.half_widths",
                "must be strictly increasing",
            ));
        }
        if !positive(cal.region_size) || !positive(cal.sweep_length) || !positive(cal.local_line_width)
        {
            return Err(SettingsError::invalid(
                "calibration.region_size",
                "scan extents must be > 0",
            ));
        }

        // Burn
        let angle = self.burn.angle_per_step;
        if !angle.is_finite() || !(MIN_ANGLE_PER_STEP..=360.0).contains(&angle) {
            return Err(SettingsError::invalid(
                "burn.angle_per_step",
                "must be in [1, 360] degrees",
            ));
        }
        if self.burn.num_slices == 0 {
            return Err(SettingsError::invalid("burn.num_slices", "must be > 0"));
        }
        if !self.burn.tolerance.is_finite() || self.burn.tolerance < 0.0 {
            return Err(SettingsError::invalid("burn.tolerance", "must be >= 0"));
        }

        Ok(())
    }
}
