//! # LaserTrace Communication
//!
//! Drivers for the three actuators of the bench:
//! - Galvo mirror channels over persistent TCP streams (`MWV:` commands)
//! - The Galil rotary stage over a serial line
//! - The laser enable line over GPIO
//!
//! Every driver is owned by exactly one session. Simulated devices in
//! [`sim`] share the same traits for dry runs and tests.

pub mod galvo;
pub mod laser;
pub mod serial;
pub mod sim;
pub mod stage;

pub use galvo::{Galvo, GalvoChannel, GalvoCommand, GalvoConfig, TcpGalvoChannel};
pub use laser::{LaserGuard, LaserSwitch, SysfsGpioLaser};
pub use serial::{list_ports, LineLink, SerialLineLink, SerialPortInfo};
pub use stage::{GalilStage, GalilStageConfig, RotaryStage};
