//! Detected calibration targets in grid order

use lasertrace_core::{CalibrationError, PersistenceError, PixelPoint, Result};
use lasertrace_vision::Detection;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Nine target centroids sorted into the [`CoordinateGrid`](crate::CoordinateGrid) layout
///
/// Rows come from sorting by y and taking three at a time; each row is
/// then sorted by x. Contours follow the same order (`3 * row + col`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidSet {
    points: [[PixelPoint; 3]; 3],
    #[serde(default)]
    contours: Vec<Vec<PixelPoint>>,
}

impl CentroidSet {
    /// Sort exactly nine detections into grid order
    pub fn from_detections(detections: Vec<Detection>) -> Result<Self> {
        if detections.len() != 9 {
            return Err(CalibrationError::DetectionCountMismatch {
                expected: 9,
                found: detections.len(),
            }
            .into());
        }

        let mut sorted = detections;
        sorted.sort_by(|a, b| a.y.total_cmp(&b.y));
        for row in sorted.chunks_mut(3) {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
        }

        let mut points = [[PixelPoint::default(); 3]; 3];
        for (i, d) in sorted.iter().enumerate() {
            points[i / 3][i % 3] = d.center();
        }
        Ok(Self {
            points,
            contours: sorted.into_iter().map(|d| d.contour).collect(),
        })
    }

    /// Centroids without contours
    pub fn from_points(points: [[PixelPoint; 3]; 3]) -> Self {
        Self {
            points,
            contours: Vec::new(),
        }
    }

    /// Centroid of one target
    pub fn get(&self, row: usize, col: usize) -> PixelPoint {
        self.points[row][col]
    }

    /// Centroids in row-major order with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, PixelPoint)> + '_ {
        (0..3).flat_map(move |r| (0..3).map(move |c| (r, c, self.points[r][c])))
    }

    /// Target contours in row-major order, empty if not recorded
    pub fn contours(&self) -> &[Vec<PixelPoint>] {
        &self.contours
    }

    /// Every centroid translated by `(-dx, -dy)`
    pub fn shifted(&self, dx: f64, dy: f64) -> Self {
        let mut points = self.points;
        for row in points.iter_mut() {
            for p in row.iter_mut() {
                *p = p.shifted(dx, dy);
            }
        }
        Self {
            points,
            contours: self.contours.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| PersistenceError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json).map_err(|e| PersistenceError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound {
                    path: path.display().to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        let set: Self = serde_json::from_str(&content).map_err(|e| PersistenceError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if set.iter().any(|(_, _, p)| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(PersistenceError::Corrupt {
                path: path.display().to_string(),
                reason: "non-finite centroid".to_string(),
            }
            .into());
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x: f64, y: f64) -> Detection {
        Detection {
            x,
            y,
            area: 100,
            contour: vec![PixelPoint::new(x, y)],
        }
    }

    #[test]
    fn test_eight_detections_rejected() {
        let detections = (0..8).map(|i| detection(i as f64, 0.0)).collect();
        let err = CentroidSet::from_detections(detections).unwrap_err();
        assert!(matches!(
            err,
            lasertrace_core::Error::Calibration(CalibrationError::DetectionCountMismatch {
                expected: 9,
                found: 8
            })
        ));
    }

    #[test]
    fn test_scrambled_detections_sorted() {
        // slightly tilted plate, scrambled order
        let mut detections = Vec::new();
        for (row, col) in [(2, 1), (0, 0), (1, 2), (2, 0), (0, 2), (1, 0), (0, 1), (2, 2), (1, 1)] {
            let x = 100.0 + 100.0 * col as f64;
            let y = 100.0 + 100.0 * row as f64 + 3.0 * col as f64;
            detections.push(detection(x, y));
        }
        let set = CentroidSet::from_detections(detections).unwrap();
        for (row, col, p) in set.iter() {
            assert_eq!(p.x, 100.0 + 100.0 * col as f64);
            assert_eq!(p.y, 100.0 + 100.0 * row as f64 + 3.0 * col as f64);
            assert_eq!(set.contours()[3 * row + col][0], p);
        }
    }

    #[test]
    fn test_shift_subtracts() {
        let set = CentroidSet::from_points([[PixelPoint::new(200.0, 100.0); 3]; 3]);
        assert_eq!(set.shifted(130.0, 65.0).get(1, 1), PixelPoint::new(70.0, 35.0));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CentroidSet::load(dir.path()).unwrap_err();
        assert!(matches!(err, lasertrace_core::Error::Io(_)));
        assert!(!err.is_persistence_error());

        let missing = CentroidSet::load(&dir.path().join("centroids.json")).unwrap_err();
        assert!(missing.is_persistence_error());
    }
}
