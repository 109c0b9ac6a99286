//! Galvo mirror control
//!
//! Each mirror axis is driven by its own controller reachable over a
//! persistent TCP stream. Commands are plain ASCII lines; the only two the
//! bench uses are the voltage set-point and the update-mode switch.
//!
//! Commands are fire-and-forget. [`Galvo`] therefore sleeps a fixed settle
//! delay after every command so the next optical sample sees the mirror at
//! rest.

use lasertrace_core::{ActuationError, Axis, ConnectionError, Error, Result, VoltagePoint};
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Galvo controller command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GalvoCommand {
    /// Drive the mirror to a voltage
    SetVoltage(f64),
    /// Apply set-points immediately
    NormalUpdateMode,
}

impl GalvoCommand {
    /// Wire representation, terminated by CRLF
    pub fn encode(&self) -> String {
        match self {
            GalvoCommand::SetVoltage(v) => format!("MWV:{}\r\n", v),
            GalvoCommand::NormalUpdateMode => "UPMODE:NORMAL\r\n".to_string(),
        }
    }
}

/// One galvo axis command channel
pub trait GalvoChannel: Send {
    /// Send a raw command line
    fn send(&mut self, command: &str) -> Result<()>;

    /// Channel name for logs
    fn name(&self) -> &str;
}

/// TCP stream to one galvo controller
pub struct TcpGalvoChannel {
    name: String,
    stream: TcpStream,
}

impl TcpGalvoChannel {
    /// Connect to `host:port`
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let name = format!("{}:{}", host, port);
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| ConnectionError::FailedToOpen {
                port: name.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ConnectionError::FailedToOpen {
                port: name.clone(),
                reason: "hostname did not resolve".to_string(),
            })?;

        let stream =
            TcpStream::connect_timeout(&addr, timeout).map_err(|e| ConnectionError::TcpError {
                reason: format!("{}: {}", name, e),
            })?;
        stream
            .set_nodelay(true)
            .and_then(|_| stream.set_write_timeout(Some(timeout)))
            .map_err(|e| ConnectionError::TcpError {
                reason: format!("{}: {}", name, e),
            })?;

        tracing::info!("Connected galvo channel {}", name);
        Ok(Self { name, stream })
    }
}

impl GalvoChannel for TcpGalvoChannel {
    fn send(&mut self, command: &str) -> Result<()> {
        self.stream.write_all(command.as_bytes()).map_err(|e| {
            Error::from(ConnectionError::ConnectionLost {
                reason: format!("{}: {}", self.name, e),
            })
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Galvo motion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalvoConfig {
    /// Delay after every command
    pub settle: Duration,
    /// Absolute voltage envelope per axis
    pub max_voltage: f64,
}

impl Default for GalvoConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(5),
            max_voltage: 10.0,
        }
    }
}

/// The X/Y mirror pair
pub struct Galvo {
    x: Box<dyn GalvoChannel>,
    y: Box<dyn GalvoChannel>,
    config: GalvoConfig,
    last_x: Option<f64>,
    last_y: Option<f64>,
}

impl Galvo {
    /// Pair two channels
    pub fn new(x: Box<dyn GalvoChannel>, y: Box<dyn GalvoChannel>, config: GalvoConfig) -> Self {
        Self {
            x,
            y,
            config,
            last_x: None,
            last_y: None,
        }
    }

    /// Put both controllers in normal update mode
    pub fn initialize(&mut self) -> Result<()> {
        let cmd = GalvoCommand::NormalUpdateMode.encode();
        self.x.send(&cmd)?;
        self.y.send(&cmd)?;
        Ok(())
    }

    /// Drive one axis and wait for it to settle
    pub fn move_axis(&mut self, axis: Axis, voltage: f64) -> Result<()> {
        if !voltage.is_finite() || voltage.abs() > self.config.max_voltage {
            return Err(ActuationError::VoltageOutOfRange {
                axis: axis.to_string(),
                voltage,
                limit: self.config.max_voltage,
            }
            .into());
        }

        let cmd = GalvoCommand::SetVoltage(voltage).encode();
        match axis {
            Axis::X => {
                self.x.send(&cmd)?;
                self.last_x = Some(voltage);
            }
            Axis::Y => {
                self.y.send(&cmd)?;
                self.last_y = Some(voltage);
            }
        }

        if !self.config.settle.is_zero() {
            std::thread::sleep(self.config.settle);
        }
        Ok(())
    }

    /// Drive X then Y
    pub fn move_to(&mut self, target: VoltagePoint) -> Result<()> {
        self.move_axis(Axis::X, target.x)?;
        self.move_axis(Axis::Y, target.y)
    }

    /// Last commanded position, once both axes have been driven
    pub fn position(&self) -> Option<VoltagePoint> {
        Some(VoltagePoint::new(self.last_x?, self.last_y?))
    }

    /// Configured envelope and settle delay
    pub fn config(&self) -> &GalvoConfig {
        &self.config
    }
}

impl std::fmt::Debug for Galvo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Galvo")
            .field("x", &self.x.name())
            .field("y", &self.y.name())
            .field("config", &self.config)
            .finish()
    }
}
