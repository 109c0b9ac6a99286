use lasertrace_core::PixelPoint;
use lasertrace_targeting::Tumour;
use nalgebra::Point3;
use proptest::prelude::*;

fn block() -> Tumour {
    let mut points = Vec::new();
    for z in [-20.0, 0.0, 20.0] {
        for y in [140.0, 160.0] {
            for x in [220.0, 180.0, 200.0] {
                points.push(Point3::new(x, y, z));
            }
        }
    }
    Tumour::new(points, (200.0, 150.0))
}

#[test]
fn test_slices_are_deterministic() {
    let tumour = block();
    let first = tumour.generate_slices(3, 5.0);
    for _ in 0..5 {
        assert_eq!(tumour.generate_slices(3, 5.0), first);
    }
}

#[test]
fn test_slice_points_sorted_by_row_then_column() {
    let slices = block().generate_slices(3, 5.0);
    assert_eq!(slices.len(), 3);
    assert_eq!(
        slices[0].points,
        vec![
            PixelPoint::new(180.0, 140.0),
            PixelPoint::new(200.0, 140.0),
            PixelPoint::new(220.0, 140.0),
            PixelPoint::new(180.0, 160.0),
            PixelPoint::new(200.0, 160.0),
            PixelPoint::new(220.0, 160.0),
        ]
    );
    let levels: Vec<f64> = slices.iter().map(|s| s.level).collect();
    assert_eq!(levels, vec![-20.0, 0.0, 20.0]);
}

#[test]
fn test_overlapping_bands_prefer_lower_level() {
    // Levels 0, 5, 10 with tolerance 6: z = 4 is nearest to 5 but within
    // reach of 0, so it lands on 0.
    let tumour = Tumour::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 4.0),
            Point3::new(2.0, 0.0, 10.0),
        ],
        (0.0, 0.0),
    );
    let slices = tumour.generate_slices(3, 6.0);

    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].index, 0);
    assert_eq!(
        slices[0].points,
        vec![PixelPoint::new(0.0, 0.0), PixelPoint::new(1.0, 0.0)]
    );
    assert_eq!(slices[1].index, 1);
    assert_eq!(slices[1].points, vec![PixelPoint::new(2.0, 0.0)]);
}

#[test]
fn test_single_level_at_lowest_z() {
    let slices = block().generate_slices(1, 25.0);
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].level, -20.0);
    assert_eq!(slices[0].points.len(), 12);
}

#[test]
fn test_rotation_is_cumulative() {
    let mut twice = block();
    twice.rotate_tumour(36.0);
    twice.rotate_tumour(36.0);

    let mut once = block();
    once.rotate_tumour(72.0);

    assert_eq!(twice.rotation(), 72.0);
    assert_eq!(once.rotation(), 72.0);
    for (a, b) in twice.points().iter().zip(once.points()) {
        assert!((a - b).norm() < 1e-9);
    }
    assert_ne!(twice.points(), block().points());
}

#[test]
fn test_rotation_keeps_stage_axis_height() {
    let mut tumour = block();
    let before: Vec<f64> = tumour.points().iter().map(|p| p.y).collect();
    tumour.rotate_tumour(-36.0);
    let after: Vec<f64> = tumour.points().iter().map(|p| p.y).collect();
    assert_eq!(before, after);
}

#[test]
fn test_full_revolution_returns_cloud() {
    let mut tumour = block();
    for _ in 0..10 {
        tumour.rotate_tumour(-36.0);
    }
    assert!((tumour.rotation() + 360.0).abs() < 1e-9);
    for (a, b) in tumour.points().iter().zip(block().points()) {
        assert!((a - b).norm() < 1e-9);
    }
}

proptest! {
    #[test]
    fn prop_slicing_never_duplicates_points(
        raw in prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0, -50.0f64..50.0), 1..60),
        num_slices in 1usize..20,
        tolerance in 0.0f64..30.0,
    ) {
        let points: Vec<Point3<f64>> = raw.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect();
        let tumour = Tumour::new(points, (0.0, 0.0));
        let slices = tumour.generate_slices(num_slices, tolerance);

        let assigned: usize = slices.iter().map(|s| s.points.len()).sum();
        prop_assert!(assigned <= raw.len());
        prop_assert!(slices.len() <= num_slices);
        for pair in slices.windows(2) {
            prop_assert!(pair[0].index < pair[1].index);
        }
        for slice in &slices {
            prop_assert!(!slice.points.is_empty());
            for w in slice.points.windows(2) {
                prop_assert!((w[0].y, w[0].x) <= (w[1].y, w[1].x));
            }
        }
    }

    #[test]
    fn prop_wide_tolerance_keeps_every_point(
        raw in prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0, -50.0f64..50.0), 1..60),
        num_slices in 1usize..20,
    ) {
        let points: Vec<Point3<f64>> = raw.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect();
        let tumour = Tumour::new(points, (0.0, 0.0));
        let slices = tumour.generate_slices(num_slices, 100.0);

        prop_assert_eq!(slices.len(), 1);
        prop_assert_eq!(slices[0].points.len(), raw.len());
    }
}
