//! Stage alignment against the light panel
//!
//! With the panel lit, the plate's silhouette is largest when it faces the
//! camera squarely. The aligner samples the target area on both sides of
//! the start angle and parks the stage at the maximum.

use lasertrace_communication::RotaryStage;
use lasertrace_core::{CancelFlag, Result};
use lasertrace_vision::{Camera, ImageAnalysis};

/// Result of one alignment sweep
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    /// Angle relative to the start at which the stage was parked
    pub best_angle: f64,
    pub best_area: f64,
    /// `(angle, area)` for every sample
    pub samples: Vec<(f64, f64)>,
}

/// Sweeps `±increments × step_deg` around the current angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageAligner {
    pub increments: u32,
    pub step_deg: f64,
}

impl Default for StageAligner {
    fn default() -> Self {
        Self {
            increments: 50,
            step_deg: 0.15,
        }
    }
}

impl StageAligner {
    pub fn align(
        &self,
        stage: &mut dyn RotaryStage,
        camera: &mut dyn Camera,
        analysis: &dyn ImageAnalysis,
        cancel: &CancelFlag,
    ) -> Result<AlignmentResult> {
        let mut samples = Vec::with_capacity(2 * self.increments as usize + 1);
        let mut angle = 0.0;
        let mut measure = |angle: f64, camera: &mut dyn Camera| -> Result<()> {
            let area = analysis.target_area(&camera.capture()?)?;
            tracing::debug!("Alignment sample {:+.2}°: area {}", angle, area);
            samples.push((angle, area));
            Ok(())
        };

        measure(angle, &mut *camera)?;
        for _ in 0..self.increments {
            cancel.check()?;
            stage.rotate(self.step_deg)?;
            angle += self.step_deg;
            measure(angle, &mut *camera)?;
        }

        if angle != 0.0 {
            stage.rotate(-angle)?;
            angle = 0.0;
        }
        for _ in 0..self.increments {
            cancel.check()?;
            stage.rotate(-self.step_deg)?;
            angle -= self.step_deg;
            measure(angle, &mut *camera)?;
        }

        let (best_angle, best_area) = samples
            .iter()
            .copied()
            .fold((0.0, f64::MIN), |best, s| if s.1 > best.1 { s } else { best });
        let correction = best_angle - angle;
        if correction != 0.0 {
            stage.rotate(correction)?;
        }

        tracing::info!("Stage aligned at {:+.2}° (area {})", best_angle, best_area);
        Ok(AlignmentResult {
            best_angle,
            best_area,
            samples,
        })
    }
}
