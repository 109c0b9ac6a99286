//! Laser enable line
//!
//! The laser head is gated by a single digital output. The only safe default
//! is "off": [`LaserGuard`] ties the enabled period to a scope so every exit
//! path, including `?` propagation and panics, drives the line low.

use lasertrace_core::{ActuationError, Result};
use std::path::{Path, PathBuf};

/// Binary laser output
pub trait LaserSwitch: Send {
    /// Drive the output
    fn set_output(&mut self, on: bool) -> Result<()>;

    /// Last state successfully commanded
    fn is_on(&self) -> bool;

    /// Enable the laser
    fn laser_on(&mut self) -> Result<()> {
        self.set_output(true)
    }

    /// Disable the laser
    fn laser_off(&mut self) -> Result<()> {
        self.set_output(false)
    }
}

/// Laser gated by a sysfs GPIO value file
#[derive(Debug)]
pub struct SysfsGpioLaser {
    value_path: PathBuf,
    on: bool,
}

impl SysfsGpioLaser {
    /// Open the GPIO line and force it low
    pub fn open(value_path: impl AsRef<Path>) -> Result<Self> {
        let mut laser = Self {
            value_path: value_path.as_ref().to_path_buf(),
            on: true,
        };
        laser.set_output(false)?;
        tracing::info!("Laser GPIO ready at {}", laser.value_path.display());
        Ok(laser)
    }
}

impl LaserSwitch for SysfsGpioLaser {
    fn set_output(&mut self, on: bool) -> Result<()> {
        std::fs::write(&self.value_path, if on { "1" } else { "0" }).map_err(|e| {
            ActuationError::CommandRejected {
                device: format!("laser gpio {}", self.value_path.display()),
                reason: e.to_string(),
            }
        })?;
        self.on = on;
        tracing::debug!("Laser {}", if on { "ON" } else { "OFF" });
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Scoped laser enable
///
/// Created by [`LaserGuard::engage`]; the laser is switched off when the
/// guard is released or dropped.
pub struct LaserGuard<'a> {
    laser: &'a mut dyn LaserSwitch,
    armed: bool,
}

impl<'a> LaserGuard<'a> {
    /// Switch the laser on for the lifetime of the guard
    ///
    /// If switching on fails the output is still driven off before the
    /// error is returned.
    pub fn engage(laser: &'a mut dyn LaserSwitch) -> Result<Self> {
        if let Err(e) = laser.set_output(true) {
            if let Err(off) = laser.set_output(false) {
                tracing::error!("Laser off after failed enable also failed: {}", off);
            }
            return Err(e);
        }
        Ok(Self { laser, armed: true })
    }

    /// Switch the laser off and report the result
    ///
    /// A failed off leaves the guard armed, so dropping it tries once more.
    pub fn release(mut self) -> Result<()> {
        self.laser.set_output(false)?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for LaserGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.laser.set_output(false) {
                tracing::error!("LASER MAY STILL BE ON: forced off failed: {}", e);
            }
        }
    }
}
