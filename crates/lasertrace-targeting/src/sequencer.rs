//! Rotary burn sequencer
//!
//! One session walks the stage through `360 / angle_per_step` steps. Each
//! step slices the tumour at its current rotation, traces every slice with
//! the laser held on, then turns the software model by `-angle_per_step`
//! and the physical stage by `+angle_per_step`.
//!
//! The dry run ([`BurnSequencer::plan`]) takes no hardware at all: it
//! produces the same slices and voltages without a laser or stage to call.

use crate::artifacts::write_json;
use crate::tumour::{Slice, Tumour};
use lasertrace_calibration::{CentroidSet, CoordinateGrid, CoordinateMapper};
use lasertrace_communication::{Galvo, LaserGuard, LaserSwitch, RotaryStage};
use lasertrace_core::{CancelFlag, Error, PixelPoint, Result, VoltagePoint};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Smallest stage move between steps, degrees
pub const MIN_ANGLE_PER_STEP: f64 = 1.0;

/// Session geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnConfig {
    /// Stage move between steps, degrees
    pub angle_per_step: f64,
    pub num_slices: usize,
    /// Maximum z distance from a slice level, pixels
    pub tolerance: f64,
    /// Stage move that turns the tumour from the reference camera to the laser
    pub laser_face_offset: f64,
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            angle_per_step: 36.0,
            num_slices: 15,
            tolerance: 20.0,
            laser_face_offset: 89.0,
        }
    }
}

impl BurnConfig {
    /// Whole steps in one revolution, at most 360
    pub fn steps(&self) -> Result<usize> {
        if !self.angle_per_step.is_finite() || self.angle_per_step < MIN_ANGLE_PER_STEP {
            return Err(Error::other(format!(
                "angle per step must be at least {}°, got {}",
                MIN_ANGLE_PER_STEP, self.angle_per_step
            )));
        }
        let steps = (360.0 / self.angle_per_step).trunc() as usize;
        if steps == 0 {
            return Err(Error::other(format!(
                "angle per step {} leaves no step in a revolution",
                self.angle_per_step
            )));
        }
        Ok(steps)
    }
}

/// Mapper for a burn session
///
/// The reference camera centroids are shifted into the laser camera's frame
/// before being paired with the fine grid.
pub fn session_mapper(
    reference: &CentroidSet,
    shift: [f64; 2],
    fine_grid: &CoordinateGrid,
) -> Result<CoordinateMapper> {
    CoordinateMapper::fit(&reference.shifted(shift[0], shift[1]), fine_grid)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlannedPoint {
    pub pixel: PixelPoint,
    pub voltage: VoltagePoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSlice {
    pub index: usize,
    pub level: f64,
    pub points: Vec<PlannedPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub step: usize,
    /// Software rotation of the model when the step was sliced
    pub rotation: f64,
    pub slices: Vec<PlannedSlice>,
}

/// Dry-run output: every slice of every step with its voltages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurnPlan {
    pub session_id: Uuid,
    pub steps: Vec<PlannedStep>,
}

impl BurnPlan {
    pub fn point_count(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|s| &s.slices)
            .map(|s| s.points.len())
            .sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)?;
        tracing::info!("Burn plan written to {}", path.display());
        Ok(())
    }
}

/// Summary of a completed session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurnReport {
    pub session_id: Uuid,
    pub steps: usize,
    pub points: usize,
    pub slices_per_step: Vec<usize>,
}

/// Galvo, laser and stage owned for one burn session
pub struct BurnSequencer<'a> {
    galvo: &'a mut Galvo,
    laser: &'a mut dyn LaserSwitch,
    stage: &'a mut dyn RotaryStage,
    mapper: CoordinateMapper,
    config: BurnConfig,
}

impl<'a> BurnSequencer<'a> {
    pub fn new(
        galvo: &'a mut Galvo,
        laser: &'a mut dyn LaserSwitch,
        stage: &'a mut dyn RotaryStage,
        mapper: CoordinateMapper,
        config: BurnConfig,
    ) -> Self {
        Self {
            galvo,
            laser,
            stage,
            mapper,
            config,
        }
    }

    /// Slice and project every step without touching any hardware
    ///
    /// The model is still rotated step by step, so the plan matches what a
    /// real session would trace.
    pub fn plan(tumour: &mut Tumour, mapper: &CoordinateMapper, config: &BurnConfig) -> Result<BurnPlan> {
        let steps = config.steps()?;
        let session_id = Uuid::new_v4();
        let mut planned = Vec::new();

        for step in 0..steps {
            let rotation = tumour.rotation();
            let slices = tumour
                .generate_slices(config.num_slices, config.tolerance)
                .into_iter()
                .map(|slice| plan_slice(slice, mapper))
                .collect();
            planned.push(PlannedStep {
                step,
                rotation,
                slices,
            });
            tumour.rotate_tumour(-config.angle_per_step);
        }

        let plan = BurnPlan {
            session_id,
            steps: planned,
        };
        tracing::info!(
            "Planned burn {}: {} steps, {} points",
            session_id,
            steps,
            plan.point_count()
        );
        Ok(plan)
    }

    /// Run a full session
    ///
    /// Any error inside a step drops the laser guard before it propagates.
    /// Cancellation is honoured before each step and before each point.
    pub fn run(&mut self, tumour: &mut Tumour, cancel: &CancelFlag) -> Result<BurnReport> {
        let steps = self.config.steps()?;
        let session_id = Uuid::new_v4();
        let mut slices_per_step = Vec::new();
        let mut points = 0;

        tracing::info!("Burn session {} started: {} steps", session_id, steps);
        cancel.check()?;
        self.stage.rotate(self.config.laser_face_offset)?;

        for step in 0..steps {
            let _span = tracing::info_span!("burn_step", session = %session_id, step).entered();
            cancel.check()?;

            let slices = tumour.generate_slices(self.config.num_slices, self.config.tolerance);
            points += self.trace(&slices, cancel)?;
            slices_per_step.push(slices.len());

            tumour.rotate_tumour(-self.config.angle_per_step);
            self.stage.rotate(self.config.angle_per_step)?;
            tracing::info!("Step {} traced {} slices", step, slices.len());
        }

        self.stage.rotate(-self.config.laser_face_offset)?;
        tracing::info!("Burn session {} finished: {} points", session_id, points);
        Ok(BurnReport {
            session_id,
            steps,
            points,
            slices_per_step,
        })
    }

    fn trace(&mut self, slices: &[Slice], cancel: &CancelFlag) -> Result<usize> {
        let mut traced = 0;
        let guard = LaserGuard::engage(&mut *self.laser)?;
        for slice in slices {
            for &pixel in &slice.points {
                cancel.check()?;
                self.galvo.move_to(self.mapper.project_point(pixel))?;
                traced += 1;
            }
        }
        guard.release()?;
        Ok(traced)
    }
}

fn plan_slice(slice: Slice, mapper: &CoordinateMapper) -> PlannedSlice {
    PlannedSlice {
        index: slice.index,
        level: slice.level,
        points: slice
            .points
            .into_iter()
            .map(|pixel| PlannedPoint {
                pixel,
                voltage: mapper.project_point(pixel),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_per_revolution() {
        assert_eq!(BurnConfig::default().steps().unwrap(), 10);
        let odd = BurnConfig {
            angle_per_step: 50.0,
            ..BurnConfig::default()
        };
        assert_eq!(odd.steps().unwrap(), 7);
    }

    #[test]
    fn test_invalid_step_angles() {
        for angle in [0.0, -36.0, 400.0, f64::NAN, 1e-300, 1e-6, 0.5] {
            let config = BurnConfig {
                angle_per_step: angle,
                ..BurnConfig::default()
            };
            assert!(config.steps().is_err(), "angle {} accepted", angle);
        }
        let finest = BurnConfig {
            angle_per_step: MIN_ANGLE_PER_STEP,
            ..BurnConfig::default()
        };
        assert_eq!(finest.steps().unwrap(), 360);
    }
}
