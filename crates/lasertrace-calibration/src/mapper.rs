//! Pixel to voltage mapping
//!
//! Two independent ordinary least squares lines, one per axis. There is no
//! cross-axis term, so a rotated or skewed camera shows up as residual.

use crate::centroids::CentroidSet;
use crate::grid::CoordinateGrid;
use lasertrace_core::{Axis, CalibrationError, PixelPoint, Result, VoltagePoint};
use serde::{Deserialize, Serialize};

/// `voltage = slope * pixel + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    /// Least squares fit of `(pixel, voltage)` samples
    pub fn fit(samples: &[(f64, f64)], axis: Axis) -> Result<Self> {
        let degenerate = |reason: &str| CalibrationError::DegenerateFit {
            axis: axis.to_string(),
            reason: reason.to_string(),
        };
        if samples.len() < 2 {
            return Err(degenerate("fewer than two samples").into());
        }

        let n = samples.len() as f64;
        let mean_x = samples.iter().map(|s| s.0).sum::<f64>() / n;
        let mean_y = samples.iter().map(|s| s.1).sum::<f64>() / n;
        let (sxx, sxy) = samples.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
            let dx = x - mean_x;
            (sxx + dx * dx, sxy + dx * (y - mean_y))
        });

        if !sxx.is_finite() || sxx <= f64::EPSILON * n {
            return Err(degenerate("pixel coordinates do not vary").into());
        }
        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn eval(&self, pixel: f64) -> f64 {
        self.slope * pixel + self.intercept
    }
}

/// Fitted pixel to voltage projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMapper {
    pub x: LinearModel,
    pub y: LinearModel,
    /// RMS distance between projected and training voltages
    pub rms_error: f64,
}

impl CoordinateMapper {
    /// Pair centroids and fine voltages cell by cell
    pub fn fit(centroids: &CentroidSet, fine_grid: &CoordinateGrid) -> Result<Self> {
        let pairs: Vec<(PixelPoint, VoltagePoint)> = centroids
            .iter()
            .map(|(r, c, pixel)| (pixel, fine_grid.get(r, c)))
            .collect();
        Self::from_pairs(&pairs)
    }

    /// Fit from exactly nine correspondences
    pub fn from_pairs(pairs: &[(PixelPoint, VoltagePoint)]) -> Result<Self> {
        if pairs.len() != 9 {
            return Err(CalibrationError::DetectionCountMismatch {
                expected: 9,
                found: pairs.len(),
            }
            .into());
        }

        let xs: Vec<(f64, f64)> = pairs.iter().map(|(p, v)| (p.x, v.x)).collect();
        let ys: Vec<(f64, f64)> = pairs.iter().map(|(p, v)| (p.y, v.y)).collect();
        let mut mapper = Self {
            x: LinearModel::fit(&xs, Axis::X)?,
            y: LinearModel::fit(&ys, Axis::Y)?,
            rms_error: 0.0,
        };

        let sum_sq: f64 = pairs
            .iter()
            .map(|(p, v)| {
                let projected = mapper.project_point(*p);
                (projected.x - v.x).powi(2) + (projected.y - v.y).powi(2)
            })
            .sum();
        mapper.rms_error = (sum_sq / pairs.len() as f64).sqrt();

        tracing::info!(
            "Mapper fitted: vx = {:.6}·px + {:.4}, vy = {:.6}·py + {:.4}, rms {:.5} V",
            mapper.x.slope,
            mapper.x.intercept,
            mapper.y.slope,
            mapper.y.intercept,
            mapper.rms_error
        );
        Ok(mapper)
    }

    pub fn project(&self, pixel_x: f64, pixel_y: f64) -> VoltagePoint {
        VoltagePoint::new(self.x.eval(pixel_x), self.y.eval(pixel_y))
    }

    pub fn project_point(&self, pixel: PixelPoint) -> VoltagePoint {
        self.project(pixel.x, pixel.y)
    }
}
