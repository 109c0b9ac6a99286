//! Error handling for LaserTrace
//!
//! Provides the error types for all layers of the control core:
//! - Calibration errors (optical feedback, detection, state machine)
//! - Actuation errors (galvo, stage and laser commands)
//! - Connection errors (TCP galvo channels, serial stage link)
//! - Persistence errors (calibration record and artifacts)
//!
//! Every variant aborts the current operation. Nothing here is retried
//! automatically; callers force the laser off before unwinding.

use thiserror::Error;

/// Calibration error type
///
/// Raised by the feedback scanner, the calibration engine and the
/// coordinate mapper.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// The feedback scan never produced a sample above the sentinel.
    #[error("No optical signal at calibration point ({row}, {col}): {reason}")]
    SensorAmbiguous {
        /// Grid row of the point being scanned.
        row: usize,
        /// Grid column of the point being scanned.
        col: usize,
        /// Which scan produced no signal.
        reason: String,
    },

    /// Centroid detection returned the wrong number of targets.
    #[error("Expected {expected} calibration targets, detected {found}")]
    DetectionCountMismatch {
        /// Number of targets the calibration plate carries.
        expected: usize,
        /// Number of targets actually detected.
        found: usize,
    },

    /// Invalid calibration state transition
    #[error("Invalid calibration transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The current state name.
        current: String,
        /// The requested state name.
        requested: String,
    },

    /// The samples of one axis do not vary, so no slope can be fitted.
    #[error("Degenerate regression on {axis} axis: {reason}")]
    DegenerateFit {
        /// Axis name.
        axis: String,
        /// Description of the problem.
        reason: String,
    },
}

/// Actuation error type
///
/// Represents failures of the physical actuators: galvo mirrors, the rotary
/// stage and the laser switch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuationError {
    /// The device did not report completion in time.
    #[error("{device} did not complete within {timeout_ms}ms")]
    Timeout {
        /// Device name.
        device: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Command was rejected or could not be delivered.
    #[error("{device} rejected command: {reason}")]
    CommandRejected {
        /// Device name.
        device: String,
        /// The reason the command was rejected.
        reason: String,
    },

    /// Galvo voltage outside the configured envelope.
    #[error("Voltage {voltage} on {axis} axis exceeds limit ±{limit}")]
    VoltageOutOfRange {
        /// Axis name.
        axis: String,
        /// Requested voltage.
        voltage: f64,
        /// Configured absolute limit.
        limit: f64,
    },

    /// Device answered with something the protocol does not allow.
    #[error("Protocol error from {device}: {reason}")]
    ProtocolError {
        /// Device name.
        device: String,
        /// The unexpected response.
        reason: String,
    },
}

/// Connection error type
///
/// Represents errors opening or using the transport to a device.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Failed to open port or socket
    #[error("Failed to open {port}: {reason}")]
    FailedToOpen {
        /// The port or address that failed to open.
        port: String,
        /// The reason it failed.
        reason: String,
    },

    /// TCP connection error
    #[error("TCP connection error: {reason}")]
    TcpError {
        /// The reason for the TCP error.
        reason: String,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },
}

/// Persistence error type
///
/// Raised when loading or storing calibration records and artifacts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// File does not exist
    #[error("File not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: String,
    },

    /// File exists but its contents are malformed or incomplete.
    #[error("Corrupt record {path}: {reason}")]
    Corrupt {
        /// Path of the record.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// File could not be written.
    #[error("Failed to write {path}: {reason}")]
    Write {
        /// Path of the record.
        path: String,
        /// The reason the write failed.
        reason: String,
    },
}

/// Main error type for LaserTrace
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Calibration error
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Actuation error
    #[error(transparent)]
    Actuation(#[from] ActuationError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Persistence error
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Operation stopped at a step boundary on operator request.
    #[error("Operation cancelled")]
    Cancelled,

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an actuation timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Actuation(ActuationError::Timeout { .. }))
    }

    /// Check if this is a persistence error
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }

    /// Check if the operation was cancelled by the operator
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Errors that must stop the session and wait for the operator
    pub fn is_safety_abort(&self) -> bool {
        matches!(
            self,
            Error::Calibration(_)
                | Error::Actuation(_)
                | Error::Persistence(PersistenceError::Corrupt { .. })
                | Error::Cancelled
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::DetectionCountMismatch {
            expected: 9,
            found: 8,
        };
        assert_eq!(err.to_string(), "Expected 9 calibration targets, detected 8");

        let err = CalibrationError::SensorAmbiguous {
            row: 1,
            col: 2,
            reason: "local scan".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No optical signal at calibration point (1, 2): local scan"
        );
    }

    #[test]
    fn test_actuation_error_display() {
        let err = ActuationError::Timeout {
            device: "stage".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(err.to_string(), "stage did not complete within 500ms");
    }

    #[test]
    fn test_error_predicates() {
        let err: Error = ActuationError::Timeout {
            device: "stage".to_string(),
            timeout_ms: 1,
        }
        .into();
        assert!(err.is_timeout());
        assert!(err.is_safety_abort());

        let err: Error = PersistenceError::Corrupt {
            path: "a.json".to_string(),
            reason: "missing field".to_string(),
        }
        .into();
        assert!(err.is_persistence_error());
        assert!(err.is_safety_abort());
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::other("x").is_safety_abort());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
