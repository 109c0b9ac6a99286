use lasertrace_communication::sim::{SharedBeam, SimulatedGalvoChannel};
use lasertrace_communication::{Galvo, GalvoConfig};
use lasertrace_core::{Axis, VoltagePoint};
use proptest::prelude::*;
use std::time::Duration;

fn galvo(beam: &SharedBeam) -> Galvo {
    Galvo::new(
        Box::new(SimulatedGalvoChannel::new(Axis::X, beam.clone())),
        Box::new(SimulatedGalvoChannel::new(Axis::Y, beam.clone())),
        GalvoConfig {
            settle: Duration::ZERO,
            max_voltage: 10.0,
        },
    )
}

#[test]
fn test_initialize_sets_update_mode_on_both_axes() {
    let beam = SharedBeam::new();
    let mut galvo = galvo(&beam);
    galvo.initialize().unwrap();
    assert_eq!(
        beam.commands(),
        vec!["x:UPMODE:NORMAL".to_string(), "y:UPMODE:NORMAL".to_string()]
    );
}

#[test]
fn test_move_to_drives_x_then_y() {
    let beam = SharedBeam::new();
    let mut galvo = galvo(&beam);
    galvo.move_to(VoltagePoint::new(0.25, -0.5)).unwrap();
    assert_eq!(
        beam.commands(),
        vec!["x:MWV:0.25".to_string(), "y:MWV:-0.5".to_string()]
    );
    assert_eq!(galvo.position(), Some(VoltagePoint::new(0.25, -0.5)));
}

#[test]
fn test_non_finite_voltage_rejected() {
    let beam = SharedBeam::new();
    let mut galvo = galvo(&beam);
    assert!(galvo.move_axis(Axis::X, f64::NAN).is_err());
    assert!(galvo.move_axis(Axis::Y, f64::INFINITY).is_err());
    assert_eq!(beam.move_count(), 0);
}

#[test]
fn test_failed_channel_keeps_last_position() {
    let beam = SharedBeam::new();
    let mut galvo = Galvo::new(
        Box::new(SimulatedGalvoChannel::new(Axis::X, beam.clone()).failing_on(1)),
        Box::new(SimulatedGalvoChannel::new(Axis::Y, beam.clone())),
        GalvoConfig {
            settle: Duration::ZERO,
            max_voltage: 10.0,
        },
    );
    galvo.move_to(VoltagePoint::new(1.0, 1.0)).unwrap();
    assert!(galvo.move_to(VoltagePoint::new(2.0, 2.0)).is_err());
    assert_eq!(galvo.position(), Some(VoltagePoint::new(1.0, 1.0)));
}

proptest! {
    #[test]
    fn test_out_of_envelope_never_sent(v in 10.0001f64..1000.0, negative in any::<bool>()) {
        let beam = SharedBeam::new();
        let mut galvo = galvo(&beam);
        let v = if negative { -v } else { v };
        let err = galvo.move_axis(Axis::X, v).unwrap_err();
        prop_assert!(err.to_string().contains("exceeds limit"));
        prop_assert_eq!(beam.move_count(), 0);
    }

    #[test]
    fn test_in_envelope_reaches_beam(x in -10.0f64..=10.0, y in -10.0f64..=10.0) {
        let beam = SharedBeam::new();
        let mut galvo = galvo(&beam);
        galvo.move_to(VoltagePoint::new(x, y)).unwrap();
        prop_assert_eq!(beam.position(), Some(VoltagePoint::new(x, y)));
    }
}
