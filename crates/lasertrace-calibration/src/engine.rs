//! Calibration state machine
//!
//! `Uninitialized → CoarseGridSet → Interpolated → FineTuned → Persisted`
//!
//! A coarse grid restored from a previous record is already interpolated
//! and enters at `Interpolated`. Setting a new coarse grid restarts the
//! sequence from any state. Grids are handed out as copies; the engine is
//! the only writer.

use crate::grid::CoordinateGrid;
use crate::persistence::CalibrationRecord;
use crate::scanner::FeedbackScanner;
use lasertrace_core::{CalibrationError, CancelFlag, Result};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Calibration progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Uninitialized,
    CoarseGridSet,
    Interpolated,
    FineTuned,
    Persisted,
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::CoarseGridSet => "coarse grid set",
            Self::Interpolated => "interpolated",
            Self::FineTuned => "fine tuned",
            Self::Persisted => "persisted",
        };
        write!(f, "{}", name)
    }
}

/// Drives one calibration run
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    state: CalibrationState,
    coarse: CoordinateGrid,
    fine: CoordinateGrid,
    cell_pause: Duration,
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl CalibrationEngine {
    /// Engine pausing `cell_pause` between calibration cells
    pub fn new(cell_pause: Duration) -> Self {
        Self {
            state: CalibrationState::Uninitialized,
            coarse: CoordinateGrid::new(),
            fine: CoordinateGrid::new(),
            cell_pause,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn coarse(&self) -> CoordinateGrid {
        self.coarse
    }

    /// Fine grid, once fine tuning has completed
    pub fn fine(&self) -> Option<CoordinateGrid> {
        matches!(
            self.state,
            CalibrationState::FineTuned | CalibrationState::Persisted
        )
        .then_some(self.fine)
    }

    fn transition(&self, requested: CalibrationState, allowed: &[CalibrationState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CalibrationError::InvalidStateTransition {
                current: self.state.to_string(),
                requested: requested.to_string(),
            }
            .into())
        }
    }

    /// Coarse grid with only the edge rows and columns populated
    pub fn set_coarse_grid(&mut self, grid: CoordinateGrid) {
        self.coarse = grid;
        self.fine = CoordinateGrid::new();
        self.state = CalibrationState::CoarseGridSet;
        tracing::info!("Coarse grid set");
    }

    /// Coarse grid of a previous run
    pub fn load_coarse(&mut self, record: &CalibrationRecord) {
        self.coarse = record.coarse_grid;
        self.fine = CoordinateGrid::new();
        self.state = CalibrationState::Interpolated;
        tracing::info!("Coarse grid restored from record of {}", record.created_at);
    }

    pub fn interpolate(&mut self) -> Result<CoordinateGrid> {
        self.transition(
            CalibrationState::Interpolated,
            &[CalibrationState::CoarseGridSet],
        )?;
        self.coarse = self.coarse.interpolated();
        self.state = CalibrationState::Interpolated;
        Ok(self.coarse)
    }

    /// Refine every cell in row-major order
    ///
    /// Each cell runs a diagonal scan around its coarse voltage followed by a
    /// local scan around the diagonal result; the fine value is the centroid
    /// of the local peak region. The fine grid is only committed once all
    /// nine cells have succeeded.
    pub fn fine_tune(
        &mut self,
        scanner: &mut FeedbackScanner<'_>,
        cancel: &CancelFlag,
    ) -> Result<CoordinateGrid> {
        self.transition(
            CalibrationState::FineTuned,
            &[
                CalibrationState::Interpolated,
                CalibrationState::FineTuned,
                CalibrationState::Persisted,
            ],
        )?;

        let mut fine = CoordinateGrid::new();
        for (row, col, coarse) in self.coarse.iter() {
            cancel.check()?;
            let diagonal = scanner.scan_diagonal(coarse, row, col)?;
            let local = scanner.scan_local(diagonal.position, row, col)?;
            let refined = local
                .centroid()
                .ok_or_else(|| CalibrationError::SensorAmbiguous {
                    row,
                    col,
                    reason: "local scan".to_string(),
                })?;
            fine.set(row, col, refined);
            tracing::info!("Cell ({}, {}): coarse {} -> fine {}", row, col, coarse, refined);

            if (row, col) != (2, 2) && !self.cell_pause.is_zero() {
                std::thread::sleep(self.cell_pause);
            }
        }

        self.fine = fine;
        self.state = CalibrationState::FineTuned;
        Ok(fine)
    }

    /// Record of the finished calibration
    pub fn record(&self) -> Result<CalibrationRecord> {
        self.transition(
            CalibrationState::Persisted,
            &[CalibrationState::FineTuned, CalibrationState::Persisted],
        )?;
        Ok(CalibrationRecord::new(self.coarse, self.fine))
    }

    /// Atomically overwrite the calibration file
    pub fn persist(&mut self, path: &Path) -> Result<CalibrationRecord> {
        let record = self.record()?;
        record.save(path)?;
        self.state = CalibrationState::Persisted;
        Ok(record)
    }

    /// Resume from a complete record
    pub fn restore(&mut self, path: &Path) -> Result<CalibrationRecord> {
        let record = CalibrationRecord::load(path)?;
        self.coarse = record.coarse_grid;
        self.fine = record.fine_grid;
        self.state = CalibrationState::Persisted;
        Ok(record)
    }
}
