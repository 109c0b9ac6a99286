//! Visual check of a calibration grid

use crate::grid::CoordinateGrid;
use lasertrace_communication::{Galvo, LaserGuard, LaserSwitch};
use lasertrace_core::{CancelFlag, Result};
use lasertrace_vision::{Camera, FrameSink};
use std::path::PathBuf;
use std::time::Duration;

/// Point the beam at every cell and store a frame of each as `laser_avg_<row><col>`
///
/// The laser stays on for the whole walk and is switched off on every exit.
pub fn verify_grid(
    grid: &CoordinateGrid,
    galvo: &mut Galvo,
    laser: &mut dyn LaserSwitch,
    camera: &mut dyn Camera,
    sink: &mut dyn FrameSink,
    dwell: Duration,
    cancel: &CancelFlag,
) -> Result<Vec<PathBuf>> {
    let mut stored = Vec::with_capacity(9);
    let guard = LaserGuard::engage(laser)?;
    for (row, col, voltage) in grid.iter() {
        cancel.check()?;
        galvo.move_to(voltage)?;
        let frame = camera.capture()?;
        stored.push(sink.store(&format!("laser_avg_{}{}", row, col), &frame)?);
        if !dwell.is_zero() {
            std::thread::sleep(dwell);
        }
    }
    guard.release()?;
    tracing::info!("Verified grid, {} frames stored", stored.len());
    Ok(stored)
}
