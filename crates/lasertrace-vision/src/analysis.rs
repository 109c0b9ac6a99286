//! Image analysis
//!
//! Segmentation is a fixed luma threshold followed by 8-connected component
//! labelling, both from `imageproc`. Coordinates are pixel indices: the pixel
//! at column `c` has its center at `c`, and contours run through the centers
//! of a region's outer border pixels.

use crate::frame::Frame;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};
use lasertrace_core::{Error, PixelPoint, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bright region found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Centroid column
    pub x: f64,
    /// Centroid row
    pub y: f64,
    /// Pixel count
    pub area: usize,
    /// Outer border of the region, in trace order
    pub contour: Vec<PixelPoint>,
}

impl Detection {
    /// Centroid as a point
    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(self.x, self.y)
    }
}

/// Frame analysis consumed by calibration and alignment
pub trait ImageAnalysis {
    /// Bright regions of a frame
    fn centroids(&self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Mean optical response inside `contour`, in `[0, 255]`
    fn compute_brightness(&self, frame: &Frame, contour: &[PixelPoint]) -> Result<f64>;

    /// Area of the largest bright region, 0 when there is none
    fn target_area(&self, frame: &Frame) -> Result<f64>;
}

/// Segmentation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Pixels with a luma above this are foreground
    pub threshold: u8,
    /// Regions smaller than this are noise
    pub min_area: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            threshold: 200,
            min_area: 20,
        }
    }
}

/// Threshold + connected components analyzer
#[derive(Debug, Clone, Default)]
pub struct BlobAnalyzer {
    config: BlobConfig,
}

#[derive(Default)]
struct Blob {
    area: usize,
    sum_x: f64,
    sum_y: f64,
    contour: Vec<PixelPoint>,
}

impl BlobAnalyzer {
    /// Analyzer with explicit parameters
    pub fn new(config: BlobConfig) -> Self {
        Self { config }
    }

    fn foreground(&self, frame: &Frame) -> GrayImage {
        let gray = image::imageops::grayscale(frame.image());
        threshold(&gray, self.config.threshold, ThresholdType::Binary)
    }

    fn blobs(&self, frame: &Frame) -> Vec<Blob> {
        let mask = self.foreground(frame);
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        let mut blobs: BTreeMap<u32, Blob> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            if label.0[0] == 0 {
                continue;
            }
            let blob = blobs.entry(label.0[0]).or_default();
            blob.area += 1;
            blob.sum_x += x as f64;
            blob.sum_y += y as f64;
        }

        for contour in find_contours::<i32>(&mask) {
            if !matches!(contour.border_type, BorderType::Outer) {
                continue;
            }
            let Some(first) = contour.points.first() else {
                continue;
            };
            let label = labels.get_pixel(first.x as u32, first.y as u32).0[0];
            if let Some(blob) = blobs.get_mut(&label) {
                if blob.contour.is_empty() {
                    blob.contour = contour
                        .points
                        .iter()
                        .map(|p| PixelPoint::new(p.x as f64, p.y as f64))
                        .collect();
                }
            }
        }

        blobs
            .into_values()
            .filter(|b| b.area >= self.config.min_area)
            .collect()
    }
}

/// Contour snapped to frame pixels, without repeated or closing vertices
fn raster_polygon(contour: &[PixelPoint], width: u32, height: u32) -> Vec<Point<i32>> {
    let max_x = width.saturating_sub(1) as f64;
    let max_y = height.saturating_sub(1) as f64;
    let mut polygon: Vec<Point<i32>> = contour
        .iter()
        .map(|p| {
            Point::new(
                p.x.round().clamp(0.0, max_x) as i32,
                p.y.round().clamp(0.0, max_y) as i32,
            )
        })
        .collect();
    polygon.dedup();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

impl ImageAnalysis for BlobAnalyzer {
    fn centroids(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let detections: Vec<Detection> = self
            .blobs(frame)
            .into_iter()
            .map(|b| Detection {
                x: b.sum_x / b.area as f64,
                y: b.sum_y / b.area as f64,
                area: b.area,
                contour: b.contour,
            })
            .collect();
        tracing::debug!("Detected {} regions", detections.len());
        Ok(detections)
    }

    /// Mean green channel over the pixels inside or on `contour`
    fn compute_brightness(&self, frame: &Frame, contour: &[PixelPoint]) -> Result<f64> {
        let image = frame.image();
        let polygon = raster_polygon(contour, image.width(), image.height());
        if polygon.len() < 3 {
            return Err(Error::other(format!(
                "contour needs at least 3 distinct vertices, got {}",
                polygon.len()
            )));
        }

        let mut mask = GrayImage::new(image.width(), image.height());
        draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));

        let (sum, count) = image
            .pixels()
            .zip(mask.pixels())
            .filter(|(_, m)| m.0[0] > 0)
            .fold((0.0, 0usize), |(sum, count), (p, _)| {
                (sum + p.0[1] as f64, count + 1)
            });
        Ok(if count == 0 { 0.0 } else { sum / count as f64 })
    }

    fn target_area(&self, frame: &Frame) -> Result<f64> {
        Ok(self
            .blobs(frame)
            .iter()
            .map(|b| b.area)
            .max()
            .unwrap_or(0) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame_with_squares(squares: &[(u32, u32, u32)]) -> Frame {
        let mut img = RgbImage::new(64, 48);
        for &(x0, y0, size) in squares {
            for y in y0..y0 + size {
                for x in x0..x0 + size {
                    img.put_pixel(x, y, Rgb([255, 255, 255]));
                }
            }
        }
        Frame::new(img)
    }

    #[test]
    fn test_square_centroid_and_contour() {
        let analyzer = BlobAnalyzer::default();
        let detections = analyzer.centroids(&frame_with_squares(&[(10, 20, 7)])).unwrap();
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.area, 49);
        assert!((d.x - 13.0).abs() < 1e-9);
        assert!((d.y - 23.0).abs() < 1e-9);
        assert!(d.contour.contains(&PixelPoint::new(10.0, 20.0)));
        assert!(d.contour.contains(&PixelPoint::new(16.0, 26.0)));
        assert!(d
            .contour
            .iter()
            .all(|p| p.x == 10.0 || p.x == 16.0 || p.y == 20.0 || p.y == 26.0));
    }

    #[test]
    fn test_diagonal_neighbours_join_one_region() {
        let analyzer = BlobAnalyzer::new(BlobConfig {
            threshold: 128,
            min_area: 1,
        });
        let frame = frame_with_squares(&[(10, 10, 4), (14, 14, 4)]);
        let detections = analyzer.centroids(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].area, 32);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut img = RgbImage::new(16, 16);
        for y in 4..10 {
            for x in 4..10 {
                img.put_pixel(x, y, Rgb([200, 200, 200]));
            }
        }
        let frame = Frame::new(img);
        let at = BlobAnalyzer::new(BlobConfig {
            threshold: 200,
            min_area: 1,
        });
        let below = BlobAnalyzer::new(BlobConfig {
            threshold: 199,
            min_area: 1,
        });
        assert!(at.centroids(&frame).unwrap().is_empty());
        assert_eq!(below.centroids(&frame).unwrap().len(), 1);
    }

    #[test]
    fn test_small_regions_ignored() {
        let analyzer = BlobAnalyzer::default();
        let frame = frame_with_squares(&[(2, 2, 3), (30, 30, 8)]);
        assert_eq!(analyzer.centroids(&frame).unwrap().len(), 1);
        assert_eq!(analyzer.target_area(&frame).unwrap(), 64.0);
    }

    #[test]
    fn test_brightness_inside_contour_only() {
        let mut img = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        for y in 0..10 {
            for x in 0..10 {
                img.put_pixel(x, y, Rgb([0, 200, 0]));
            }
        }
        let frame = Frame::new(img);
        let analyzer = BlobAnalyzer::default();
        let inside = [
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(9.0, 0.0),
            PixelPoint::new(9.0, 9.0),
            PixelPoint::new(0.0, 9.0),
        ];
        assert_eq!(analyzer.compute_brightness(&frame, &inside).unwrap(), 200.0);

        let half = [
            PixelPoint::new(5.0, 0.0),
            PixelPoint::new(14.0, 0.0),
            PixelPoint::new(14.0, 9.0),
            PixelPoint::new(5.0, 9.0),
        ];
        assert_eq!(analyzer.compute_brightness(&frame, &half).unwrap(), 100.0);
    }

    #[test]
    fn test_degenerate_contour_rejected() {
        let frame = frame_with_squares(&[]);
        let analyzer = BlobAnalyzer::default();
        assert!(analyzer
            .compute_brightness(&frame, &[PixelPoint::new(0.0, 0.0)])
            .is_err());
        let collapsed = [
            PixelPoint::new(3.0, 3.0),
            PixelPoint::new(3.2, 2.9),
            PixelPoint::new(5.0, 5.0),
            PixelPoint::new(3.0, 3.0),
        ];
        assert!(analyzer.compute_brightness(&frame, &collapsed).is_err());
    }
}
