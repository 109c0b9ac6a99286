//! # LaserTrace Calibration
//!
//! Builds the mapping from camera pixels to galvo voltages.
//!
//! A coarse 3×3 [`CoordinateGrid`] is set from two operator confirmed
//! corners (or restored from disk) and interpolated. The
//! [`FeedbackScanner`] then refines every cell against the optical response
//! of its target, and the [`CalibrationEngine`] persists the coarse and fine
//! grids as one record. At burn time a [`CoordinateMapper`] is fitted from
//! the fine grid and the reference camera's [`CentroidSet`].

pub mod alignment;
pub mod centroids;
pub mod engine;
pub mod grid;
pub mod mapper;
pub mod persistence;
pub mod routine;
pub mod scanner;
pub mod verify;

pub use alignment::{AlignmentResult, StageAligner};
pub use centroids::CentroidSet;
pub use engine::{CalibrationEngine, CalibrationState};
pub use grid::CoordinateGrid;
pub use mapper::{CoordinateMapper, LinearModel};
pub use persistence::CalibrationRecord;
pub use routine::{CalibrationRoutine, CoarseSource, Operator, RoutineConfig, RoutineOutcome};
pub use scanner::{DiagonalScan, FeedbackScanner, LocalScan, ScanConfig};
pub use verify::verify_grid;
