//! Simulated devices
//!
//! In-process stand-ins for the galvo, laser and stage. They record every
//! command into shared logs so a test (or a `--simulate` dry run) can
//! inspect what the session did after the devices have been moved into it.
//! Each device can be told to fail on its n-th call.

use crate::galvo::GalvoChannel;
use crate::laser::LaserSwitch;
use crate::stage::RotaryStage;
use lasertrace_core::{ActuationError, Axis, Result, VoltagePoint};
use parking_lot::Mutex;
use std::sync::Arc;

/// Fails the n-th call (0-based) of a device
#[derive(Debug, Clone, Default)]
struct Fault {
    fail_on: Option<usize>,
    calls: usize,
}

impl Fault {
    fn tick(&mut self, device: &str) -> Result<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on == Some(call) {
            return Err(ActuationError::CommandRejected {
                device: device.to_string(),
                reason: format!("injected fault on call {}", call),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BeamState {
    x: Option<f64>,
    y: Option<f64>,
    commands: Vec<String>,
}

/// Beam position as commanded through simulated galvo channels
#[derive(Debug, Clone, Default)]
pub struct SharedBeam {
    inner: Arc<Mutex<BeamState>>,
}

impl SharedBeam {
    /// New beam with no commanded position
    pub fn new() -> Self {
        Self::default()
    }

    /// Position once both axes have been commanded
    pub fn position(&self) -> Option<VoltagePoint> {
        let state = self.inner.lock();
        Some(VoltagePoint::new(state.x?, state.y?))
    }

    /// Every raw command received, in order
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().commands.clone()
    }

    /// Number of voltage set-points received
    pub fn move_count(&self) -> usize {
        self.inner
            .lock()
            .commands
            .iter()
            .filter(|c| c.contains("MWV:"))
            .count()
    }
}

/// Galvo channel that updates a [`SharedBeam`]
#[derive(Debug)]
pub struct SimulatedGalvoChannel {
    axis: Axis,
    beam: SharedBeam,
    name: String,
    fault: Fault,
}

impl SimulatedGalvoChannel {
    /// Channel for one axis of `beam`
    pub fn new(axis: Axis, beam: SharedBeam) -> Self {
        Self {
            axis,
            beam,
            name: format!("sim-galvo-{}", axis),
            fault: Fault::default(),
        }
    }

    /// Fail the n-th send
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fault.fail_on = Some(call);
        self
    }
}

impl GalvoChannel for SimulatedGalvoChannel {
    fn send(&mut self, command: &str) -> Result<()> {
        self.fault.tick(&self.name)?;
        let mut state = self.beam.inner.lock();
        state.commands.push(format!("{}:{}", self.axis, command.trim_end()));

        if let Some(raw) = command.trim_end().strip_prefix("MWV:") {
            let v: f64 = raw.parse().map_err(|_| ActuationError::ProtocolError {
                device: self.name.clone(),
                reason: format!("bad voltage '{}'", raw),
            })?;
            match self.axis {
                Axis::X => state.x = Some(v),
                Axis::Y => state.y = Some(v),
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Shared record of laser transitions
#[derive(Debug, Clone, Default)]
pub struct LaserLog {
    inner: Arc<Mutex<Vec<bool>>>,
}

impl LaserLog {
    /// All successful transitions, oldest first
    pub fn transitions(&self) -> Vec<bool> {
        self.inner.lock().clone()
    }

    /// Most recent successful transition
    pub fn last(&self) -> Option<bool> {
        self.inner.lock().last().copied()
    }

    /// Number of times the laser was switched on
    pub fn on_count(&self) -> usize {
        self.inner.lock().iter().filter(|on| **on).count()
    }
}

/// Laser switch that records every successful transition
#[derive(Debug, Default)]
pub struct RecordingLaser {
    log: LaserLog,
    on: bool,
    fault: Fault,
}

impl RecordingLaser {
    /// New laser, off
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the transition log
    pub fn log(&self) -> LaserLog {
        self.log.clone()
    }

    /// Fail the n-th `set_output` call
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fault.fail_on = Some(call);
        self
    }
}

impl LaserSwitch for RecordingLaser {
    fn set_output(&mut self, on: bool) -> Result<()> {
        self.fault.tick("sim-laser")?;
        self.log.inner.lock().push(on);
        self.on = on;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Stage that records relative rotations
#[derive(Debug, Default)]
pub struct SimulatedStage {
    rotations: Arc<Mutex<Vec<f64>>>,
    fault: Fault,
}

impl SimulatedStage {
    /// New stage at rest
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the rotation log
    pub fn rotations(&self) -> Arc<Mutex<Vec<f64>>> {
        Arc::clone(&self.rotations)
    }

    /// Fail the n-th rotation
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fault.fail_on = Some(call);
        self
    }
}

impl RotaryStage for SimulatedStage {
    fn rotate(&mut self, degrees: f64) -> Result<()> {
        self.fault.tick("sim-stage")?;
        self.rotations.lock().push(degrees);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_tracks_beam() {
        let beam = SharedBeam::new();
        let mut x = SimulatedGalvoChannel::new(Axis::X, beam.clone());
        let mut y = SimulatedGalvoChannel::new(Axis::Y, beam.clone());
        x.send("MWV:0.5\r\n").unwrap();
        assert_eq!(beam.position(), None);
        y.send("MWV:-1.25\r\n").unwrap();
        assert_eq!(beam.position(), Some(VoltagePoint::new(0.5, -1.25)));
        assert_eq!(beam.move_count(), 2);
    }

    #[test]
    fn test_fault_fires_once() {
        let mut stage = SimulatedStage::new().failing_on(1);
        let log = stage.rotations();
        stage.rotate(1.0).unwrap();
        assert!(stage.rotate(2.0).is_err());
        stage.rotate(3.0).unwrap();
        assert_eq!(*log.lock(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_failed_laser_call_not_recorded() {
        let mut laser = RecordingLaser::new().failing_on(0);
        let log = laser.log();
        assert!(laser.laser_on().is_err());
        laser.laser_off().unwrap();
        assert_eq!(log.transitions(), vec![false]);
    }
}
