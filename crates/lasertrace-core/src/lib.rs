//! # LaserTrace Core
//!
//! Core types shared by every LaserTrace crate.
//! Provides the voltage/pixel coordinate types, the error taxonomy used by
//! calibration and burn sessions, and the cooperative cancellation flag.

pub mod cancel;
pub mod error;
pub mod geometry;

pub use cancel::CancelFlag;
pub use error::{
    ActuationError, CalibrationError, ConnectionError, Error, PersistenceError, Result,
};
pub use geometry::{Axis, PixelPoint, VoltagePoint};
