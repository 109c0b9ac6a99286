//! Silhouette acquisition for the reconstruction stage

use lasertrace_communication::RotaryStage;
use lasertrace_core::{CancelFlag, Result};
use lasertrace_vision::{Camera, FrameSink};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TomographyConfig {
    pub frames: usize,
    /// Stage move after each frame, degrees
    pub step_deg: f64,
}

impl Default for TomographyConfig {
    fn default() -> Self {
        Self {
            frames: 360,
            step_deg: 1.0,
        }
    }
}

/// Capture `angle_<i>` then rotate, for every frame
///
/// The light panel must be on. The stage ends one full sweep from where it
/// started.
pub fn acquire_tomography(
    stage: &mut dyn RotaryStage,
    camera: &mut dyn Camera,
    sink: &mut dyn FrameSink,
    config: &TomographyConfig,
    cancel: &CancelFlag,
) -> Result<Vec<PathBuf>> {
    let mut stored = Vec::with_capacity(config.frames);
    for i in 0..config.frames {
        cancel.check()?;
        let frame = camera.capture()?;
        stored.push(sink.store(&format!("angle_{}", i), &frame)?);
        stage.rotate(config.step_deg)?;
        if i % 45 == 0 {
            tracing::info!("Tomography frame {}/{}", i + 1, config.frames);
        }
    }
    tracing::info!("Tomography complete: {} frames", stored.len());
    Ok(stored)
}
