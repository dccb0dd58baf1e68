use super::*;
use crate::config::SimulatorConfig;
use crate::frame::PixelFormat;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(1000);

fn open_first(transport: &SimulatedTransport) -> Box<dyn CameraDevice> {
    let descriptors = transport.enumerate().unwrap();
    let mut device = transport.create_device(&descriptors[0]).unwrap();
    device.open().unwrap();
    device
}

#[test]
fn test_enumerate_reports_names_in_order() {
    let transport = SimulatedTransport::new(vec![
        SimulatedCamera::new("lower"),
        SimulatedCamera::new(""),
    ]);

    let descriptors = transport.enumerate().unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].index, 0);
    assert_eq!(descriptors[0].user_defined_name, "lower");
    assert_eq!(descriptors[1].user_defined_name, "");
    assert_ne!(descriptors[0].serial_number, descriptors[1].serial_number);
}

#[test]
fn test_grab_one_delivers_padded_native_frames() {
    let transport = SimulatedTransport::new(vec![SimulatedCamera::new("cam")
        .with_resolution(8, 4)
        .with_format(PixelFormat::Mono8)
        .with_row_padding(4)]);
    let mut device = open_first(&transport);

    let first = device.grab_one(TIMEOUT).unwrap().unwrap();
    assert_eq!(first.sequence, 0);
    assert_eq!(first.stride, 12);
    assert_eq!(first.data.len(), 48);
    assert_eq!(first.format, PixelFormat::Mono8);

    let second = device.grab_one(TIMEOUT).unwrap().unwrap();
    assert_eq!(second.sequence, 1);
}

#[test]
fn test_grab_requires_open_device() {
    let transport = SimulatedTransport::new(vec![SimulatedCamera::new("cam")]);
    let descriptors = transport.enumerate().unwrap();
    let mut device = transport.create_device(&descriptors[0]).unwrap();

    assert!(!device.is_open());
    assert!(device.grab_one(TIMEOUT).is_err());
}

#[test]
fn test_continuous_grab_stops_after_count() {
    let transport = SimulatedTransport::new(vec![SimulatedCamera::new("cam")]);
    let mut device = open_first(&transport);

    device.start_grabbing(2).unwrap();
    assert!(device.is_grabbing());
    assert!(device.retrieve_result(TIMEOUT).unwrap().is_some());
    assert!(device.is_grabbing());
    assert!(device.retrieve_result(TIMEOUT).unwrap().is_some());
    assert!(!device.is_grabbing());
    assert!(device.retrieve_result(TIMEOUT).is_err());
}

#[test]
fn test_scripted_timeout_and_fault() {
    let transport = SimulatedTransport::new(vec![
        SimulatedCamera::new("slow").timing_out_after(1),
        SimulatedCamera::new("broken").faulting_after(0),
    ]);
    let descriptors = transport.enumerate().unwrap();

    let mut slow = transport.create_device(&descriptors[0]).unwrap();
    slow.open().unwrap();
    assert!(slow.grab_one(TIMEOUT).unwrap().is_some());
    assert!(slow.grab_one(TIMEOUT).unwrap().is_none());

    let mut broken = transport.create_device(&descriptors[1]).unwrap();
    broken.open().unwrap();
    assert!(broken.grab_one(TIMEOUT).is_err());
}

#[test]
fn test_probe_tracks_lifecycle() {
    let transport = SimulatedTransport::new(vec![SimulatedCamera::new("cam")]);
    let probe = transport.probe();

    let mut device = open_first(&transport);
    assert_eq!(probe.attached(), 1);
    device.close();
    device.close();

    let lifecycle = probe.lifecycle(0);
    assert_eq!(lifecycle.created, 1);
    assert_eq!(lifecycle.opened, 1);
    assert_eq!(lifecycle.closed, 1);
    assert_eq!(probe.attached(), 0);
    assert!(device.open().is_err());
}

#[test]
fn test_transport_built_from_config() {
    let config = SimulatorConfig {
        cameras: crate::config::MulticapConfig::default().simulator.cameras,
    };
    let transport = SimulatedTransport::from(&config);
    let names: Vec<_> = transport
        .enumerate()
        .unwrap()
        .into_iter()
        .map(|d| d.user_defined_name)
        .collect();
    assert_eq!(names, vec!["upper", "lower"]);

    let mut device = open_first(&transport);
    let frame = device.grab_one(TIMEOUT).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (640, 480));
    assert_eq!(frame.format, PixelFormat::BayerRg8);
}
