//! Hardware session
//!
//! Opens every device once and owns it for the lifetime of the command.
//! With `--simulate` the same session is built from in-process devices.

use anyhow::{Context, Result};
use lasertrace_calibration::{RoutineConfig, ScanConfig, StageAligner};
use lasertrace_communication::sim::{RecordingLaser, SharedBeam, SimulatedGalvoChannel, SimulatedStage};
use lasertrace_communication::{
    GalilStage, GalilStageConfig, Galvo, GalvoConfig, LaserSwitch, RotaryStage, SerialLineLink,
    SysfsGpioLaser, TcpGalvoChannel,
};
use lasertrace_core::Axis;
use lasertrace_settings::{CalibrationSettings, CameraSettings, Config};
use lasertrace_targeting::BurnConfig;
use lasertrace_vision::sim::{BeamSpotAnalysis, SimulatedCamera};
use lasertrace_vision::{BlobAnalyzer, BlobConfig, Camera, CommandCamera, ImageAnalysis};
use std::time::Duration;

/// Area reported by the simulated light panel
const SIMULATED_PANEL_AREA: f64 = 40_000.0;

/// Devices owned by one command
pub struct Session {
    pub galvo: Galvo,
    pub laser: Box<dyn LaserSwitch>,
    pub stage: Box<dyn RotaryStage>,
    /// Camera facing the laser side of the plate
    pub laser_camera: Box<dyn Camera>,
    /// Camera facing the stage from the reference side
    pub reference_camera: Box<dyn Camera>,
    pub analysis: Box<dyn ImageAnalysis>,
    simulated: bool,
}

impl Session {
    /// Connect to the bench described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let galvo_cfg = &config.galvo;
        let timeout = Duration::from_millis(galvo_cfg.connect_timeout_ms);
        let x = TcpGalvoChannel::connect(&galvo_cfg.x_host, galvo_cfg.port, timeout)
            .with_context(|| format!("connecting X galvo at {}", galvo_cfg.x_host))?;
        let y = TcpGalvoChannel::connect(&galvo_cfg.y_host, galvo_cfg.port, timeout)
            .with_context(|| format!("connecting Y galvo at {}", galvo_cfg.y_host))?;
        let galvo = Galvo::new(Box::new(x), Box::new(y), galvo_config(config));

        let laser = SysfsGpioLaser::open(&config.laser.gpio_value_path)
            .context("opening laser GPIO")?;

        let stage_cfg = &config.stage;
        let link = SerialLineLink::open(
            &stage_cfg.port,
            stage_cfg.baud_rate,
            Duration::from_millis(stage_cfg.read_timeout_ms),
        )
        .with_context(|| format!("opening stage controller on {}", stage_cfg.port))?;
        let stage = GalilStage::new(
            link,
            GalilStageConfig {
                steps_per_degree: stage_cfg.steps_per_degree,
                speed: stage_cfg.speed,
                accel: stage_cfg.accel,
                decel: stage_cfg.decel,
                move_timeout: Duration::from_millis(stage_cfg.move_timeout_ms),
            },
        );

        let cameras = &config.cameras;
        let analysis = BlobAnalyzer::new(BlobConfig {
            threshold: config.vision.threshold,
            min_area: config.vision.min_area,
        });

        let mut session = Self {
            galvo,
            laser: Box::new(laser),
            stage: Box::new(stage),
            laser_camera: Box::new(command_camera(cameras, &cameras.laser_device, "laser")),
            reference_camera: Box::new(command_camera(cameras, &cameras.reference_device, "reference")),
            analysis: Box::new(analysis),
            simulated: false,
        };
        session.galvo.initialize().context("setting galvo update mode")?;
        tracing::info!("Hardware session open");
        Ok(session)
    }

    /// In-process bench with a 3×3 plate centred on 0 V
    pub fn simulated(config: &Config) -> Result<Self> {
        let beam = SharedBeam::new();
        let galvo = Galvo::new(
            Box::new(SimulatedGalvoChannel::new(Axis::X, beam.clone())),
            Box::new(SimulatedGalvoChannel::new(Axis::Y, beam.clone())),
            GalvoConfig {
                settle: Duration::ZERO,
                ..galvo_config(config)
            },
        );
        let mut session = Self {
            galvo,
            laser: Box::new(RecordingLaser::new()),
            stage: Box::new(SimulatedStage::new()),
            laser_camera: Box::new(SimulatedCamera::new()),
            reference_camera: Box::new(SimulatedCamera::new()),
            analysis: Box::new(BeamSpotAnalysis::plate(beam).with_area(SIMULATED_PANEL_AREA)),
            simulated: true,
        };
        session.galvo.initialize()?;
        tracing::info!("Simulated session open");
        Ok(session)
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.laser.laser_off() {
            tracing::error!("LASER MAY STILL BE ON: session close failed to switch off: {}", e);
        }
    }
}

fn command_camera(cameras: &CameraSettings, device: &str, role: &str) -> CommandCamera {
    let args = cameras
        .args
        .iter()
        .map(|a| a.replace("{device}", device))
        .collect();
    CommandCamera::new(
        cameras.program.clone(),
        args,
        cameras.scratch_dir.join(format!("{}.png", role)),
    )
}

pub fn galvo_config(config: &Config) -> GalvoConfig {
    GalvoConfig {
        settle: Duration::from_millis(config.galvo.settle_ms),
        max_voltage: config.galvo.max_voltage,
    }
}

pub fn scan_config(cal: &CalibrationSettings) -> ScanConfig {
    ScanConfig {
        cal_x: cal.cal_x,
        cal_y: cal.cal_y,
        half_widths: cal.half_widths.clone(),
        region_size: cal.region_size,
        sweep_length: cal.sweep_length,
        steps: cal.steps,
        local_line_width: cal.local_line_width,
        saturation: cal.saturation,
        ..ScanConfig::default()
    }
}

pub fn routine_config(config: &Config) -> RoutineConfig {
    let cal = &config.calibration;
    RoutineConfig {
        scan: scan_config(cal),
        cell_pause: Duration::from_millis(cal.cell_pause_ms),
        aligner: StageAligner {
            increments: cal.align_increments,
            step_deg: cal.align_step_deg,
        },
        laser_face_offset: config.burn.laser_face_offset,
        calibration_record: config.paths.calibration_record.clone(),
        reference_centroids: config.paths.reference_centroids.clone(),
    }
}

pub fn burn_config(config: &Config) -> BurnConfig {
    BurnConfig {
        angle_per_step: config.burn.angle_per_step,
        num_slices: config.burn.num_slices,
        tolerance: config.burn.tolerance,
        laser_face_offset: config.burn.laser_face_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_burn_config_matches_rig() {
        assert_eq!(burn_config(&Config::default()), BurnConfig::default());
    }

    #[test]
    fn test_step_angle_floor_agrees_with_sequencer() {
        assert_eq!(
            lasertrace_settings::MIN_ANGLE_PER_STEP,
            lasertrace_targeting::MIN_ANGLE_PER_STEP
        );
    }

    #[test]
    fn test_default_scan_config_matches_rig() {
        assert_eq!(scan_config(&Config::default().calibration), ScanConfig::default());
    }

    #[test]
    fn test_default_alignment_sweeps_fifty_increments() {
        let aligner = routine_config(&Config::default()).aligner;
        assert_eq!(aligner, StageAligner::default());
        assert_eq!(aligner.increments, 50);
    }

    #[test]
    fn test_camera_device_substituted() {
        let cameras = CameraSettings::default();
        let camera = command_camera(&cameras, "/dev/video7", "laser");
        let debug = format!("{:?}", camera);
        assert!(debug.contains("/dev/video7"));
        assert!(!debug.contains("{device}"));
    }

    #[test]
    fn test_simulated_session_starts_with_laser_off() {
        let session = Session::simulated(&Config::default()).unwrap();
        assert!(session.is_simulated());
        assert!(!session.laser.is_on());
    }
}
