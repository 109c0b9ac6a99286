//! Coordinate types
//!
//! Two coordinate spaces meet in the control core: camera pixels and galvo
//! voltages. They get distinct types so a pixel can never be sent to a
//! mirror by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Galvo mirror axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Horizontal mirror
    X,
    /// Vertical mirror
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
        }
    }
}

/// A pair of galvo voltages.
///
/// Serialized as a two element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct VoltagePoint {
    /// X mirror voltage
    pub x: f64,
    /// Y mirror voltage
    pub y: f64,
}

impl VoltagePoint {
    /// Create a new voltage point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Elementwise midpoint of two voltage pairs
    pub fn midpoint(a: VoltagePoint, b: VoltagePoint) -> VoltagePoint {
        VoltagePoint::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    /// Arithmetic mean of a set of points, `None` when empty.
    pub fn centroid(points: &[VoltagePoint]) -> Option<VoltagePoint> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(VoltagePoint::new(sx / n, sy / n))
    }

    /// Both components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for VoltagePoint {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<VoltagePoint> for [f64; 2] {
    fn from(p: VoltagePoint) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for VoltagePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4} V, {:.4} V)", self.x, self.y)
    }
}

/// A position in camera pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct PixelPoint {
    /// Column coordinate
    pub x: f64,
    /// Row coordinate
    pub y: f64,
}

impl PixelPoint {
    /// Create a new pixel point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by `(-dx, -dy)`
    pub fn shifted(&self, dx: f64, dy: f64) -> PixelPoint {
        PixelPoint::new(self.x - dx, self.y - dy)
    }
}

impl From<[f64; 2]> for PixelPoint {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<PixelPoint> for [f64; 2] {
    fn from(p: PixelPoint) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for PixelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1} px, {:.1} px)", self.x, self.y)
    }
}
