//! Device capabilities shared by every crate in the station workspace.
//!
//! A *device* is a handle to one physical peripheral. It is opened by a
//! factory, owned by exactly one worker thread, and closed by that same
//! worker. Nothing in here knows about threads; the proxies in
//! `station_core` add that.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::path::Path;

/// Error type used at every device boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A handle that owns a physical resource and can release it.
pub trait Device {
    /// Release the underlying resource. Called once by the owning worker.
    fn close(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A device that produces one value per call, blocking until it has one.
pub trait Readable<T>: Device {
    fn read(&mut self) -> Result<T, BoxError>;
}

/// A tethered photo camera.
pub trait PhotoCamera: Device {
    /// Serial number reported by the camera body; used to pick a file name.
    fn serial_number(&mut self) -> Result<String, BoxError>;

    /// Capture one image and store it at `dest`.
    fn capture_to(&mut self, dest: &Path) -> Result<(), BoxError>;
}

/// Raw time-of-flight ranging capability.
pub trait Ranger {
    fn start_ranging(&mut self, level: u8) -> Result<(), BoxError>;
    /// Latest distance in sensor units.
    fn distance_units(&mut self) -> Result<u16, BoxError>;
    fn stop_ranging(&mut self) -> Result<(), BoxError>;
}

/// Byte link to a serial weighing scale.
pub trait ScalePort: std::io::Read + std::io::Write {
    /// Drop any bytes buffered on the input side.
    fn clear_input(&mut self) -> std::io::Result<()>;
}

/// Dimmable ring lights.
pub trait Lights {
    /// Set brightness as a fraction in `0.0..=1.0`.
    fn set_level(&mut self, level: f32) -> Result<(), BoxError>;

    fn off(&mut self) -> Result<(), BoxError> {
        self.set_level(0.0)
    }
}

impl<T: Device + ?Sized> Device for Box<T> {
    fn close(&mut self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<V, T: Readable<V> + ?Sized> Readable<V> for Box<T> {
    fn read(&mut self) -> Result<V, BoxError> {
        (**self).read()
    }
}

impl<T: PhotoCamera + ?Sized> PhotoCamera for Box<T> {
    fn serial_number(&mut self) -> Result<String, BoxError> {
        (**self).serial_number()
    }

    fn capture_to(&mut self, dest: &Path) -> Result<(), BoxError> {
        (**self).capture_to(dest)
    }
}
