//! Rotary stage (goniometer) control
//!
//! The stage is a stepper axis behind a Galil motion controller. A move is
//! a relative step count followed by a begin command; completion is observed
//! by polling the `_BGH` (axis busy) operand until it reads 0.
//!
//! Moves block the caller. A move that does not finish within the configured
//! bound fails with [`ActuationError::Timeout`] and is not retried.

use crate::serial::LineLink;
use lasertrace_core::{ActuationError, Result};
use std::time::{Duration, Instant};

/// Blocking rotation stage
pub trait RotaryStage: Send {
    /// Rotate by a relative angle and return once motion is complete
    fn rotate(&mut self, degrees: f64) -> Result<()>;
}

/// Galil axis H parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalilStageConfig {
    /// Motor steps per degree of stage rotation
    pub steps_per_degree: f64,
    /// Slew speed in steps/s
    pub speed: u32,
    /// Acceleration in steps/s²
    pub accel: u32,
    /// Deceleration in steps/s²
    pub decel: u32,
    /// Upper bound for one complete move
    pub move_timeout: Duration,
}

impl Default for GalilStageConfig {
    fn default() -> Self {
        Self {
            steps_per_degree: 12800.0,
            speed: 60000,
            accel: 5000,
            decel: 5000,
            move_timeout: Duration::from_secs(120),
        }
    }
}

const PREPARE: [&str; 3] = ["SHH\r\n", "MTH = -2\r\n", "CN1\r\n"];
const BUSY_QUERY: &str = "MG _BGH\r\n";

/// Galil controlled rotary stage
pub struct GalilStage<L: LineLink> {
    link: L,
    config: GalilStageConfig,
}

impl<L: LineLink> GalilStage<L> {
    /// Wrap an open link
    pub fn new(link: L, config: GalilStageConfig) -> Self {
        Self { link, config }
    }

    /// Relative step count for an angle, truncated toward zero
    pub fn angle_to_steps(&self, degrees: f64) -> i64 {
        (degrees * self.config.steps_per_degree).trunc() as i64
    }

    /// Move program for one relative rotation
    pub fn move_commands(&self, degrees: f64) -> Vec<String> {
        vec![
            format!("PRH={}\r\n", self.angle_to_steps(degrees)),
            format!("SPH={}\r\n", self.config.speed),
            format!("ACH={}\r\n", self.config.accel),
            format!("DCH={}\r\n", self.config.decel),
            "BGH\r\n".to_string(),
            BUSY_QUERY.to_string(),
        ]
    }

    /// Release the link
    pub fn into_inner(self) -> L {
        self.link
    }

    fn parse_busy(&self, message: &str) -> Result<bool> {
        match message.trim().chars().next() {
            Some('0') => Ok(false),
            Some('1') => Ok(true),
            _ => Err(ActuationError::ProtocolError {
                device: self.link.name().to_string(),
                reason: format!("unexpected busy status '{}'", message.trim()),
            }
            .into()),
        }
    }
}

impl<L: LineLink> RotaryStage for GalilStage<L> {
    fn rotate(&mut self, degrees: f64) -> Result<()> {
        let started = Instant::now();
        let commands = self.move_commands(degrees);
        tracing::debug!(
            "Stage move {:.3}° ({} steps)",
            degrees,
            self.angle_to_steps(degrees)
        );

        for cmd in PREPARE.iter().copied().chain(commands.iter().map(String::as_str)) {
            self.link.write_line(cmd)?;
        }

        // every command is answered by one line
        for _ in 0..PREPARE.len() + commands.len() {
            self.link.read_line()?;
        }

        let line = self.link.read_line()?;
        let mut busy = self.parse_busy(&line)?;
        while busy {
            if started.elapsed() > self.config.move_timeout {
                return Err(ActuationError::Timeout {
                    device: format!("stage {}", self.link.name()),
                    timeout_ms: self.config.move_timeout.as_millis() as u64,
                }
                .into());
            }
            self.link.write_line(BUSY_QUERY)?;
            self.link.read_line()?;
            let line = self.link.read_line()?;
            busy = self.parse_busy(&line)?;
        }

        tracing::info!(
            "Stage rotated {:.3}° in {:.2}s",
            degrees,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
