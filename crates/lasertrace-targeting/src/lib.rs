//! # LaserTrace Targeting
//!
//! Turns a reconstructed tumour point cloud into laser paths.
//!
//! A [`Tumour`] holds the cloud in the stage's body frame and is rotated in
//! software in lock-step with the physical stage. For every rotation step
//! the [`BurnSequencer`] slices the cloud into z-bands, projects each point
//! through the calibration mapper and traces it with the galvo while the
//! laser is held on by a scoped guard.

pub mod artifacts;
pub mod sequencer;
pub mod tomography;
pub mod tumour;

pub use artifacts::ReconstructionArtifacts;
pub use sequencer::{
    session_mapper, BurnConfig, BurnPlan, BurnReport, BurnSequencer, PlannedPoint, PlannedSlice,
    PlannedStep, MIN_ANGLE_PER_STEP,
};
pub use tomography::{acquire_tomography, TomographyConfig};
pub use tumour::{Slice, SliceMap, Tumour};
