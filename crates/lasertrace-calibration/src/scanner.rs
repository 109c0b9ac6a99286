//! Feedback scanner
//!
//! Locates the voltage at which the beam lands on one calibration target by
//! sampling the brightness inside that target's contour while the galvo
//! steps through a bounded region. Every sample is strictly sequential:
//! move, settle (inside [`Galvo`]), capture, measure.
//!
//! Step sizes are `region_size * cal / steps` per axis, where `cal` converts
//! plate units to volts.

use lasertrace_communication::{Galvo, LaserGuard, LaserSwitch};
use lasertrace_core::{
    Axis, CalibrationError, CancelFlag, Error, PixelPoint, Result, VoltagePoint,
};
use lasertrace_vision::{Camera, ImageAnalysis};

/// Scan geometry and thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Volts per plate unit on X
    pub cal_x: f64,
    /// Volts per plate unit on Y
    pub cal_y: f64,
    /// Diagonal sweep half-widths, smallest first
    pub half_widths: Vec<u32>,
    pub region_size: f64,
    pub sweep_length: f64,
    pub steps: u32,
    pub local_line_width: f64,
    /// Samples at or above this value are accumulated during the diagonal
    pub saturation: f64,
    /// Initial maximum; any real sample exceeds it
    pub sentinel: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cal_x: 20.0 / (113.41 + 114.21),
            cal_y: 20.0 / (153.02 + 154.22),
            half_widths: vec![2, 3, 4, 5, 6, 7, 8],
            region_size: 10.0,
            sweep_length: 15.0,
            steps: 10,
            local_line_width: 15.0,
            saturation: 254.0,
            sentinel: -10.0,
        }
    }
}

impl ScanConfig {
    fn cal(&self) -> VoltagePoint {
        VoltagePoint::new(self.cal_x, self.cal_y)
    }

    /// Voltage increment between consecutive samples
    pub fn step(&self) -> VoltagePoint {
        let n = self.steps as f64;
        VoltagePoint::new(
            self.region_size * self.cal_x / n,
            self.region_size * self.cal_y / n,
        )
    }

    fn validate(&self) -> Result<()> {
        let step = self.step();
        if self.steps == 0 || !(step.x.is_finite() && step.x > 0.0 && step.y.is_finite() && step.y > 0.0)
        {
            return Err(Error::other("scan step must be a positive voltage on both axes"));
        }
        if self.half_widths.is_empty() {
            return Err(Error::other("diagonal scan needs at least one half-width"));
        }
        Ok(())
    }
}

/// Outcome of a diagonal sweep
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalScan {
    /// Centroid of saturated samples, or the single brightest sample
    pub position: VoltagePoint,
    pub best_position: VoltagePoint,
    pub best_value: f64,
    /// Number of saturated samples
    pub saturated: usize,
}

/// Outcome of a local raster scan
#[derive(Debug, Clone, PartialEq)]
pub struct LocalScan {
    pub best_brightness: f64,
    /// Every sample equal to the final maximum
    pub hits: Vec<VoltagePoint>,
}

impl LocalScan {
    /// Centre of the peak response region
    pub fn centroid(&self) -> Option<VoltagePoint> {
        VoltagePoint::centroid(&self.hits)
    }
}

/// Galvo + laser + camera loop for one calibration plate
pub struct FeedbackScanner<'a> {
    galvo: &'a mut Galvo,
    laser: &'a mut dyn LaserSwitch,
    camera: &'a mut dyn Camera,
    analysis: &'a dyn ImageAnalysis,
    contours: &'a [Vec<PixelPoint>],
    config: ScanConfig,
    cancel: CancelFlag,
}

fn sample(camera: &mut dyn Camera, analysis: &dyn ImageAnalysis, contour: &[PixelPoint]) -> Result<f64> {
    let frame = camera.capture()?;
    analysis.compute_brightness(&frame, contour)
}

impl<'a> FeedbackScanner<'a> {
    /// `contours` holds one contour per target in grid order
    pub fn new(
        galvo: &'a mut Galvo,
        laser: &'a mut dyn LaserSwitch,
        camera: &'a mut dyn Camera,
        analysis: &'a dyn ImageAnalysis,
        contours: &'a [Vec<PixelPoint>],
        config: ScanConfig,
    ) -> Result<Self> {
        config.validate()?;
        if contours.len() != 9 {
            return Err(CalibrationError::DetectionCountMismatch {
                expected: 9,
                found: contours.len(),
            }
            .into());
        }
        Ok(Self {
            galvo,
            laser,
            camera,
            analysis,
            contours,
            config,
            cancel: CancelFlag::new(),
        })
    }

    /// Check `cancel` before every sample
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Expanding diagonal sweeps through `center`
    ///
    /// For each half-width `w` the beam walks from `center - w * cal` along
    /// the diagonal for `sweep_length * cal`. The laser is on for each sweep
    /// and off between them and on any error.
    pub fn scan_diagonal(&mut self, center: VoltagePoint, row: usize, col: usize) -> Result<DiagonalScan> {
        let contours = self.contours;
        let contour = &contours[3 * row + col];
        let cal = self.config.cal();
        let step = self.config.step();
        let sweep = self.config.sweep_length;

        let mut best_value = self.config.sentinel;
        let mut best_position = None;
        let mut saturated = Vec::new();

        for &half_width in &self.config.half_widths {
            let w = half_width as f64;
            let start = VoltagePoint::new(center.x - w * cal.x, center.y - w * cal.y);
            let end = VoltagePoint::new(start.x + sweep * cal.x, start.y + sweep * cal.y);

            let guard = LaserGuard::engage(&mut *self.laser)?;
            let mut k = 0u32;
            loop {
                let p = VoltagePoint::new(start.x + k as f64 * step.x, start.y + k as f64 * step.y);
                if !(p.y < end.y && p.x < end.x) {
                    break;
                }
                self.cancel.check()?;
                self.galvo.move_axis(Axis::Y, p.y)?;
                self.galvo.move_axis(Axis::X, p.x)?;
                let value = sample(&mut *self.camera, self.analysis, contour)?;

                if value >= self.config.saturation {
                    saturated.push(p);
                } else {
                    tracing::trace!("({}, {}) diagonal sample {} at {} below saturation", row, col, value, p);
                }
                if value > best_value {
                    best_value = value;
                    best_position = Some(p);
                }
                k += 1;
            }
            guard.release()?;
        }

        let best_position = best_position.ok_or_else(|| CalibrationError::SensorAmbiguous {
            row,
            col,
            reason: "diagonal scan".to_string(),
        })?;
        let position = VoltagePoint::centroid(&saturated).unwrap_or(best_position);

        tracing::info!(
            "({}, {}) diagonal: best {:.0} at {}, {} saturated, using {}",
            row,
            col,
            best_value,
            best_position,
            saturated.len(),
            position
        );
        Ok(DiagonalScan {
            position,
            best_position,
            best_value,
            saturated: saturated.len(),
        })
    }

    /// Raster scan of a `local_line_width` square centred on `center`
    ///
    /// Rows step the Y mirror, columns the X mirror. A sample equal to the
    /// running maximum joins the hit list; a larger one replaces it.
    pub fn scan_local(&mut self, center: VoltagePoint, row: usize, col: usize) -> Result<LocalScan> {
        let contours = self.contours;
        let contour = &contours[3 * row + col];
        let cal = self.config.cal();
        let step = self.config.step();
        let line = self.config.local_line_width;

        let start = VoltagePoint::new(center.x - line / 2.0 * cal.x, center.y - line / 2.0 * cal.y);
        let end = VoltagePoint::new(start.x + line * cal.x, start.y + line * cal.y);

        let mut max = self.config.sentinel;
        let mut hits = Vec::new();

        let guard = LaserGuard::engage(&mut *self.laser)?;
        let mut r = 0u32;
        loop {
            let y = start.y + r as f64 * step.y;
            if !(y < end.y) {
                break;
            }
            self.galvo.move_axis(Axis::Y, y)?;

            let mut c = 0u32;
            loop {
                let x = start.x + c as f64 * step.x;
                if !(x < end.x) {
                    break;
                }
                self.cancel.check()?;
                self.galvo.move_axis(Axis::X, x)?;
                let value = sample(&mut *self.camera, self.analysis, contour)?;

                if value == max {
                    hits.push(VoltagePoint::new(x, y));
                } else if value > max {
                    hits.clear();
                    hits.push(VoltagePoint::new(x, y));
                    max = value;
                }
                c += 1;
            }
            r += 1;
        }
        guard.release()?;

        if hits.is_empty() {
            return Err(CalibrationError::SensorAmbiguous {
                row,
                col,
                reason: "local scan".to_string(),
            }
            .into());
        }
        tracing::info!("({}, {}) local: peak {:.0} over {} samples", row, col, max, hits.len());
        Ok(LocalScan {
            best_brightness: max,
            hits,
        })
    }
}
