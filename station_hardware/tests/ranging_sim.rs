use station_hardware::{DistanceSensor, SimulatedRanger};
use station_traits::{BoxError, Device, ManualClock, Ranger, Readable};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn converts_units_to_centimetres() {
    let mut sensor = DistanceSensor::open(SimulatedRanger::new(500), 1, 0.1).unwrap();
    let cm = sensor.read().unwrap();
    assert!((cm - 50.0).abs() < 1e-4);
}

#[test]
fn every_reading_waits_one_measurement() {
    let clock = ManualClock::new();
    let ranger = SimulatedRanger::with_clock(500, clock.clone());
    let mut sensor = DistanceSensor::open(ranger, 3, 0.1).unwrap();
    for _ in 0..4 {
        sensor.read().unwrap();
    }
    assert_eq!(clock.slept(), vec![Duration::from_millis(200); 4]);
}

#[test]
fn invalid_level_fails_to_open() {
    let err = DistanceSensor::open(SimulatedRanger::new(500), 9, 0.1)
        .err()
        .expect("level 9 is rejected");
    assert!(err.to_string().contains("start ranging"));
}

/// Ranger that records start/stop calls.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Ranger for Recorder {
    fn start_ranging(&mut self, level: u8) -> Result<(), BoxError> {
        self.0.lock().unwrap().push(format!("start {level}"));
        Ok(())
    }
    fn distance_units(&mut self) -> Result<u16, BoxError> {
        Ok(42)
    }
    fn stop_ranging(&mut self) -> Result<(), BoxError> {
        self.0.lock().unwrap().push("stop".to_string());
        Ok(())
    }
}

#[test]
fn close_stops_ranging_once() {
    let rec = Recorder::default();
    let mut sensor = DistanceSensor::open(rec.clone(), 3, 1.0).unwrap();
    assert_eq!(sensor.read().unwrap(), 42.0);
    sensor.close().unwrap();
    sensor.close().unwrap();
    assert_eq!(*rec.0.lock().unwrap(), vec!["start 3", "stop"]);
}
