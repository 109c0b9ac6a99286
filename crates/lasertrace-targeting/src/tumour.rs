//! Tumour point cloud in the stage body frame
//!
//! The stage turns about the body frame's y axis. The rotation centre is
//! `(cx, cy)` in the x/y plane, as delivered by the reconstruction.

use lasertrace_core::PixelPoint;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::Serialize;

/// Points of one z-band, in trace order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    /// Index of the z-level among the `num_slices` levels
    pub index: usize,
    /// z-level the points were assigned to
    pub level: f64,
    /// `(x, y)` pairs sorted by y, then x
    pub points: Vec<PixelPoint>,
}

/// Non-empty slices in increasing z
pub type SliceMap = Vec<Slice>;

/// Point cloud that rotates with the stage
#[derive(Debug, Clone, PartialEq)]
pub struct Tumour {
    points: Vec<Point3<f64>>,
    center: (f64, f64),
    rotation: f64,
}

impl Tumour {
    /// Cloud already expressed in the body frame
    pub fn new(points: Vec<Point3<f64>>, center: (f64, f64)) -> Self {
        Self {
            points,
            center,
            rotation: 0.0,
        }
    }

    /// Convert reconstruction output into the body frame
    ///
    /// Reconstruction coordinates `(x, y, z)` become `(x, z, -y)`, then y
    /// is flipped to image rows with `image_height - y`.
    pub fn from_reconstruction(coordinates: &[[f64; 3]], center: [f64; 2], image_height: f64) -> Self {
        let points = coordinates
            .iter()
            .map(|&[x, y, z]| Point3::new(x, image_height - z, -y))
            .collect();
        Self::new(points, (center[0], center[1]))
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    /// Sum of every rotation applied so far, in degrees
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Rotate the cloud by `theta` degrees about the centre
    ///
    /// Applied to the current cloud, not to the original one: two calls of
    /// 36° are not the same as one call of 72° up to floating point.
    pub fn rotate_tumour(&mut self, theta: f64) {
        let transform = self.rotation_matrix(theta);
        for p in &mut self.points {
            *p = transform.transform_point(p);
        }
        self.rotation += theta;
    }

    fn rotation_matrix(&self, theta: f64) -> Matrix4<f64> {
        let (cx, cy) = self.center;
        let (s, c) = theta.to_radians().sin_cos();
        #[rustfmt::skip]
        let r_y = Matrix4::new(
            c,   0.0, s,   0.0,
            0.0, 1.0, 0.0, 0.0,
            -s,  0.0, c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        Matrix4::new_translation(&Vector3::new(cx, cy, 0.0))
            * r_y
            * Matrix4::new_translation(&Vector3::new(-cx, -cy, 0.0))
    }

    /// Bucket the cloud into `num_slices` z-bands
    ///
    /// Levels are evenly spaced from the lowest to the highest z. Each point
    /// joins the first level (lowest z) within `tolerance`, even if a later
    /// level is closer. Points matching no level are dropped.
    pub fn generate_slices(&self, num_slices: usize, tolerance: f64) -> SliceMap {
        if self.points.is_empty() || num_slices == 0 {
            return Vec::new();
        }

        let mut ordered: Vec<Point3<f64>> = self.points.clone();
        ordered.sort_by(|a, b| {
            a.z.total_cmp(&b.z)
                .then(a.y.total_cmp(&b.y))
                .then(a.x.total_cmp(&b.x))
        });
        let min_z = ordered[0].z;
        let max_z = ordered[ordered.len() - 1].z;
        let levels = linspace(min_z, max_z, num_slices);

        let mut buckets: Vec<Vec<PixelPoint>> = vec![Vec::new(); num_slices];
        for p in &ordered {
            if let Some(i) = levels.iter().position(|z| (p.z - z).abs() <= tolerance) {
                buckets[i].push(PixelPoint::new(p.x, p.y));
            }
        }

        buckets
            .into_iter()
            .zip(levels)
            .enumerate()
            .filter(|(_, (points, _))| !points.is_empty())
            .map(|(index, (mut points, level))| {
                points.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
                Slice {
                    index,
                    level,
                    points,
                }
            })
            .collect()
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive; `[start]` for one
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints() {
        assert_eq!(linspace(0.0, 10.0, 3), vec![0.0, 5.0, 10.0]);
        assert_eq!(linspace(4.0, 9.0, 1), vec![4.0]);
    }

    #[test]
    fn test_reconstruction_frame() {
        let tumour = Tumour::from_reconstruction(&[[1.0, 2.0, 3.0]], [5.0, 6.0], 209.0);
        assert_eq!(tumour.points()[0], Point3::new(1.0, 206.0, -2.0));
        assert_eq!(tumour.center(), (5.0, 6.0));
    }

    #[test]
    fn test_quarter_turn_about_center() {
        let mut tumour = Tumour::new(vec![Point3::new(11.0, 7.0, 0.0)], (10.0, 7.0));
        tumour.rotate_tumour(90.0);
        let p = tumour.points()[0];
        assert!((p.x - 10.0).abs() < 1e-12);
        assert!((p.y - 7.0).abs() < 1e-12);
        assert!((p.z + 1.0).abs() < 1e-12);
        assert_eq!(tumour.rotation(), 90.0);
    }

    #[test]
    fn test_empty_cloud_has_no_slices() {
        let tumour = Tumour::new(Vec::new(), (0.0, 0.0));
        assert!(tumour.generate_slices(15, 20.0).is_empty());
    }

    #[test]
    fn test_points_outside_tolerance_dropped() {
        let tumour = Tumour::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 4.0),
                Point3::new(0.0, 0.0, 10.0),
            ],
            (0.0, 0.0),
        );
        let slices = tumour.generate_slices(2, 1.0);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices.iter().map(|s| s.points.len()).sum::<usize>(), 2);
    }
}
