use lasertrace_communication::sim::SimulatedStage;
use lasertrace_core::CancelFlag;
use lasertrace_targeting::{acquire_tomography, ReconstructionArtifacts, TomographyConfig};
use lasertrace_vision::sim::SimulatedCamera;
use lasertrace_vision::DirectorySink;

#[test]
fn test_frame_per_degree() {
    let dir = tempfile::tempdir().unwrap();
    let mut stage = SimulatedStage::new();
    let rotations = stage.rotations();
    let mut camera = SimulatedCamera::new();
    let mut sink = DirectorySink::new(dir.path().join("reconstruction"));

    let stored = acquire_tomography(
        &mut stage,
        &mut camera,
        &mut sink,
        &TomographyConfig {
            frames: 12,
            step_deg: 1.0,
        },
        &CancelFlag::new(),
    )
    .unwrap();

    assert_eq!(stored.len(), 12);
    assert!(stored[11].ends_with("angle_11.png"));
    assert_eq!(camera.captures(), 12);
    assert_eq!(*rotations.lock(), vec![1.0; 12]);
}

#[test]
fn test_default_sweep_is_one_revolution() {
    let config = TomographyConfig::default();
    assert_eq!(config.frames as f64 * config.step_deg, 360.0);
}

#[test]
fn test_stage_fault_stops_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let mut stage = SimulatedStage::new().failing_on(3);
    let mut camera = SimulatedCamera::new();
    let mut sink = DirectorySink::new(dir.path());

    let err = acquire_tomography(
        &mut stage,
        &mut camera,
        &mut sink,
        &TomographyConfig::default(),
        &CancelFlag::new(),
    )
    .unwrap_err();

    assert!(err.is_safety_abort());
    assert_eq!(camera.captures(), 4);
}

#[test]
fn test_artifacts_round_trip_into_body_frame() {
    let dir = tempfile::tempdir().unwrap();
    let coordinates = dir.path().join("data").join("coordinates.json");
    let center = dir.path().join("data").join("center.json");
    let artifacts = ReconstructionArtifacts {
        coordinates: vec![[10.0, 20.0, 30.0], [11.0, 21.0, 31.0]],
        center: [100.0, 104.5],
    };
    artifacts.save(&coordinates, &center).unwrap();

    let loaded = ReconstructionArtifacts::load(&coordinates, &center).unwrap();
    assert_eq!(loaded, artifacts);

    let tumour = loaded.tumour(209.0);
    assert_eq!(tumour.points().len(), 2);
    assert_eq!(tumour.points()[0].y, 179.0);
    assert_eq!(tumour.points()[0].z, -20.0);
    assert_eq!(tumour.center(), (100.0, 104.5));
}
