use lasertrace_calibration::{CentroidSet, CoordinateGrid, CoordinateMapper};
use lasertrace_core::{CalibrationError, Error, PixelPoint, VoltagePoint};
use lasertrace_vision::Detection;
use proptest::prelude::*;

fn plate_grid() -> CoordinateGrid {
    let mut grid = CoordinateGrid::new();
    for row in 0..3 {
        for col in 0..3 {
            grid.set(row, col, VoltagePoint::new(col as f64 - 1.0, row as f64 - 1.0));
        }
    }
    grid
}

fn detection(x: f64, y: f64) -> Detection {
    Detection {
        x,
        y,
        area: 400,
        contour: vec![
            PixelPoint::new(x - 10.0, y - 10.0),
            PixelPoint::new(x + 10.0, y - 10.0),
            PixelPoint::new(x + 10.0, y + 10.0),
        ],
    }
}

/// Detections in scrambled order, slightly jittered on the row axis
fn scrambled_detections() -> Vec<Detection> {
    let order = [(2, 1), (0, 2), (1, 0), (2, 2), (0, 0), (1, 2), (2, 0), (0, 1), (1, 1)];
    order
        .iter()
        .map(|&(row, col)| {
            let jitter = (col as f64 - 1.0) * 2.0;
            detection(100.0 + 100.0 * col as f64, 100.0 + 100.0 * row as f64 + jitter)
        })
        .collect()
}

#[test]
fn test_centroids_sorted_into_grid_order() {
    let set = CentroidSet::from_detections(scrambled_detections()).unwrap();
    for (row, col, p) in set.iter() {
        assert_eq!(p.x, 100.0 + 100.0 * col as f64);
        assert!((p.y - (100.0 + 100.0 * row as f64)).abs() <= 2.0);
    }
    assert_eq!(set.contours()[5][0], PixelPoint::new(290.0, 192.0));
}

#[test]
fn test_eight_detections_rejected() {
    let mut detections = scrambled_detections();
    detections.pop();
    let err = CentroidSet::from_detections(detections).unwrap_err();
    assert!(matches!(
        err,
        Error::Calibration(CalibrationError::DetectionCountMismatch {
            expected: 9,
            found: 8
        })
    ));
}

#[test]
fn test_plate_centre_projects_to_zero_volts() {
    let set = CentroidSet::from_detections(
        (0..9)
            .map(|i| detection(100.0 + 100.0 * (i % 3) as f64, 100.0 + 100.0 * (i / 3) as f64))
            .collect(),
    )
    .unwrap();
    let mapper = CoordinateMapper::fit(&set, &plate_grid()).unwrap();

    let v = mapper.project(200.0, 200.0);
    assert!(v.x.abs() < 1e-9 && v.y.abs() < 1e-9);
    let corner = mapper.project(300.0, 100.0);
    assert!((corner.x - 1.0).abs() < 1e-9 && (corner.y + 1.0).abs() < 1e-9);
    assert!(mapper.rms_error < 1e-9);
}

#[test]
fn test_shifted_centroids_move_the_fit() {
    let set = CentroidSet::from_detections(scrambled_detections()).unwrap();
    let shifted = set.shifted(130.0, 65.0);
    let mapper = CoordinateMapper::fit(&shifted, &plate_grid()).unwrap();

    let v = mapper.project(70.0, 135.0);
    assert!(v.x.abs() < 1e-6);
    assert!(v.y.abs() < 0.05);
}

#[test]
fn test_centroid_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("centroids_data.json");
    let set = CentroidSet::from_detections(scrambled_detections()).unwrap();
    set.save(&path).unwrap();

    assert_eq!(CentroidSet::load(&path).unwrap(), set);
}

#[test]
fn test_missing_centroid_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = CentroidSet::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.is_persistence_error());
}

proptest! {
    #[test]
    fn prop_interpolated_cells_are_neighbour_midpoints(
        left in -5.0f64..0.0,
        right in 0.0f64..5.0,
        top in -5.0f64..0.0,
        bottom in 0.0f64..5.0,
    ) {
        let grid = CoordinateGrid::from_corners(
            VoltagePoint::new(left, top),
            VoltagePoint::new(right, bottom),
        )
        .interpolated();

        for (r, c, p) in grid.iter() {
            let expected_x = [left, (left + right) / 2.0, right][c];
            let expected_y = [top, (top + bottom) / 2.0, bottom][r];
            prop_assert!((p.x - expected_x).abs() < 1e-12);
            prop_assert!((p.y - expected_y).abs() < 1e-12);
        }
    }

    #[test]
    fn prop_linear_plate_recovered(
        sx in 0.001f64..0.05,
        sy in 0.001f64..0.05,
        ox in -3.0f64..3.0,
        oy in -3.0f64..3.0,
    ) {
        let pairs: Vec<(PixelPoint, VoltagePoint)> = (0..9)
            .map(|i| {
                let px = 50.0 + 120.0 * (i % 3) as f64;
                let py = 40.0 + 90.0 * (i / 3) as f64;
                (PixelPoint::new(px, py), VoltagePoint::new(sx * px + ox, sy * py + oy))
            })
            .collect();
        let mapper = CoordinateMapper::from_pairs(&pairs).unwrap();

        prop_assert!((mapper.x.slope - sx).abs() < 1e-9);
        prop_assert!((mapper.y.slope - sy).abs() < 1e-9);
        let v = mapper.project(123.0, 321.0);
        prop_assert!((v.x - (sx * 123.0 + ox)).abs() < 1e-8);
        prop_assert!((v.y - (sy * 321.0 + oy)).abs() < 1e-8);
    }
}
