//! End-to-end calibration routine
//!
//! 1. Light panel on: align the stage to the plate.
//! 2. Light panel off: detect the targets in the laser camera.
//! 3. Coarse grid from operator corners (interpolated) or a previous record.
//! 4. Fine tune all nine cells and persist the record.
//! 5. Turn the plate back by the laser face offset and detect the targets in
//!    the reference camera; these centroids are what the burn maps from.

use crate::alignment::{AlignmentResult, StageAligner};
use crate::centroids::CentroidSet;
use crate::engine::CalibrationEngine;
use crate::grid::CoordinateGrid;
use crate::persistence::CalibrationRecord;
use crate::scanner::{FeedbackScanner, ScanConfig};
use lasertrace_communication::{Galvo, LaserSwitch, RotaryStage};
use lasertrace_core::{CancelFlag, Result, VoltagePoint};
use lasertrace_vision::{Camera, ImageAnalysis};
use std::path::PathBuf;
use std::time::Duration;

/// Operator interaction between automated steps
pub trait Operator {
    /// Show `message` and block until the operator confirms
    fn acknowledge(&mut self, message: &str) -> Result<()>;
}

/// Where the coarse grid comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CoarseSource {
    /// Operator confirmed beam positions on the top-left and bottom-right targets
    Corners {
        top_left: VoltagePoint,
        bottom_right: VoltagePoint,
    },
    /// Coarse grid of an earlier record
    Restore(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RoutineConfig {
    pub scan: ScanConfig,
    pub cell_pause: Duration,
    pub aligner: StageAligner,
    /// Stage move from the laser side to the reference camera side is `-laser_face_offset`
    pub laser_face_offset: f64,
    pub calibration_record: PathBuf,
    pub reference_centroids: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RoutineOutcome {
    pub alignment: AlignmentResult,
    pub record: CalibrationRecord,
    pub reference: CentroidSet,
}

/// Hardware borrowed for one calibration session
pub struct CalibrationRoutine<'a> {
    pub galvo: &'a mut Galvo,
    pub laser: &'a mut dyn LaserSwitch,
    pub stage: &'a mut dyn RotaryStage,
    pub laser_camera: &'a mut dyn Camera,
    pub reference_camera: &'a mut dyn Camera,
    pub analysis: &'a dyn ImageAnalysis,
    pub operator: &'a mut dyn Operator,
}

impl CalibrationRoutine<'_> {
    pub fn run(
        &mut self,
        source: &CoarseSource,
        config: &RoutineConfig,
        cancel: &CancelFlag,
    ) -> Result<RoutineOutcome> {
        self.operator.acknowledge("Turn on the light panel")?;
        let alignment =
            config
                .aligner
                .align(&mut *self.stage, &mut *self.reference_camera, self.analysis, cancel)?;
        self.operator.acknowledge("Turn off the light panel")?;

        let laser_side = self.detect(Which::Laser)?;

        let mut engine = CalibrationEngine::new(config.cell_pause);
        match source {
            CoarseSource::Corners {
                top_left,
                bottom_right,
            } => {
                engine.set_coarse_grid(CoordinateGrid::from_corners(*top_left, *bottom_right));
                engine.interpolate()?;
            }
            CoarseSource::Restore(path) => engine.load_coarse(&CalibrationRecord::load(path)?),
        }

        {
            let mut scanner = FeedbackScanner::new(
                &mut *self.galvo,
                &mut *self.laser,
                &mut *self.laser_camera,
                self.analysis,
                laser_side.contours(),
                config.scan.clone(),
            )?
            .with_cancel(cancel.clone());
            engine.fine_tune(&mut scanner, cancel)?;
        }
        let record = engine.persist(&config.calibration_record)?;

        cancel.check()?;
        self.stage.rotate(-config.laser_face_offset)?;
        let reference = self.detect(Which::Reference)?;
        reference.save(&config.reference_centroids)?;
        tracing::info!(
            "Reference centroids saved to {}",
            config.reference_centroids.display()
        );

        Ok(RoutineOutcome {
            alignment,
            record,
            reference,
        })
    }

    fn detect(&mut self, which: Which) -> Result<CentroidSet> {
        let camera = match which {
            Which::Laser => &mut *self.laser_camera,
            Which::Reference => &mut *self.reference_camera,
        };
        let frame = camera.capture()?;
        let set = CentroidSet::from_detections(self.analysis.centroids(&frame)?)?;
        tracing::info!("Detected calibration targets in {:?} camera", which);
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy)]
enum Which {
    Laser,
    Reference,
}
