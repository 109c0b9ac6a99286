//! # LaserTrace Vision
//!
//! Camera side of the bench. Capture is a pure `capture() -> Frame`
//! capability; writing frames to disk is a separate [`FrameSink`] step so
//! the control core never depends on file side effects.
//!
//! [`ImageAnalysis`] is the collaborator contract the calibration engine
//! consumes; [`BlobAnalyzer`] implements it with threshold segmentation.

pub mod analysis;
pub mod frame;
pub mod sim;

pub use analysis::{BlobAnalyzer, BlobConfig, Detection, ImageAnalysis};
pub use frame::{Camera, CommandCamera, DirectorySink, Frame, FrameSink};
