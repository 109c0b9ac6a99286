//! Optical simulation for dry runs
//!
//! [`BeamSpotAnalysis`] answers brightness queries from the commanded beam
//! position instead of from pixels: a target is lit with a Gaussian falloff
//! around the voltage that hits it, quantised to the 8-bit scale.

use crate::analysis::{Detection, ImageAnalysis};
use crate::frame::{Camera, Frame};
use image::RgbImage;
use lasertrace_communication::sim::SharedBeam;
use lasertrace_core::{PixelPoint, Result, VoltagePoint};

/// Camera returning blank frames
#[derive(Debug, Default)]
pub struct SimulatedCamera {
    captures: usize,
}

impl SimulatedCamera {
    /// New camera
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames captured so far
    pub fn captures(&self) -> usize {
        self.captures
    }
}

impl Camera for SimulatedCamera {
    fn capture(&mut self) -> Result<Frame> {
        self.captures += 1;
        Ok(Frame::new(RgbImage::new(1, 1)))
    }
}

/// A calibration target: where the camera sees it and which voltage hits it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTarget {
    /// Image position
    pub pixel: PixelPoint,
    /// Beam position that lands on the target
    pub voltage: VoltagePoint,
}

/// Beam-driven stand-in for image analysis
#[derive(Debug, Clone)]
pub struct BeamSpotAnalysis {
    beam: SharedBeam,
    targets: Vec<SimTarget>,
    sigma: f64,
    half_size: f64,
    area: f64,
}

impl BeamSpotAnalysis {
    /// Targets lit by `beam` with falloff `sigma` volts
    pub fn new(beam: SharedBeam, targets: Vec<SimTarget>, sigma: f64) -> Self {
        Self {
            beam,
            targets,
            sigma,
            half_size: 10.0,
            area: 0.0,
        }
    }

    /// Rig with a 3×3 plate: pixels 100..300 px, voltages -1..1 V
    pub fn plate(beam: SharedBeam) -> Self {
        let mut targets = Vec::with_capacity(9);
        for row in 0..3 {
            for col in 0..3 {
                targets.push(SimTarget {
                    pixel: PixelPoint::new(100.0 + 100.0 * col as f64, 100.0 + 100.0 * row as f64),
                    voltage: VoltagePoint::new(col as f64 - 1.0, row as f64 - 1.0),
                });
            }
        }
        Self::new(beam, targets, 0.3)
    }

    /// Constant reported by [`ImageAnalysis::target_area`]
    pub fn with_area(mut self, area: f64) -> Self {
        self.area = area;
        self
    }

    /// Configured targets
    pub fn targets(&self) -> &[SimTarget] {
        &self.targets
    }

    fn response(&self, target: &SimTarget) -> f64 {
        let Some(beam) = self.beam.position() else {
            return 0.0;
        };
        let d2 = (beam.x - target.voltage.x).powi(2) + (beam.y - target.voltage.y).powi(2);
        (255.0 * (-d2 / (2.0 * self.sigma * self.sigma)).exp()).round()
    }
}

impl ImageAnalysis for BeamSpotAnalysis {
    fn centroids(&self, _frame: &Frame) -> Result<Vec<Detection>> {
        let h = self.half_size;
        Ok(self
            .targets
            .iter()
            .map(|t| Detection {
                x: t.pixel.x,
                y: t.pixel.y,
                area: (4.0 * h * h) as usize,
                contour: vec![
                    PixelPoint::new(t.pixel.x - h, t.pixel.y - h),
                    PixelPoint::new(t.pixel.x + h, t.pixel.y - h),
                    PixelPoint::new(t.pixel.x + h, t.pixel.y + h),
                    PixelPoint::new(t.pixel.x - h, t.pixel.y + h),
                ],
            })
            .collect())
    }

    fn compute_brightness(&self, _frame: &Frame, contour: &[PixelPoint]) -> Result<f64> {
        let (min_x, min_y, max_x, max_y) = contour.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(a, b, c, d), p| (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
        );
        Ok(self
            .targets
            .iter()
            .filter(|t| {
                (min_x..=max_x).contains(&t.pixel.x) && (min_y..=max_y).contains(&t.pixel.y)
            })
            .map(|t| self.response(t))
            .fold(0.0, f64::max))
    }

    fn target_area(&self, _frame: &Frame) -> Result<f64> {
        Ok(self.area)
    }
}
