//! Real serial link for the scale (feature `hardware`).
use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use station_traits::ScalePort;

use crate::error::{HwError, Result};

pub struct SerialLink(Box<dyn SerialPort>);

impl SerialLink {
    /// Open `path` at `baudrate`. `timeout` bounds every read and write, which
    /// is what keeps a silent scale from hanging its worker.
    pub fn open(path: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baudrate)
            .timeout(timeout)
            .open()
            .map_err(|e| HwError::Serial(format!("open {path}: {e}")))?;
        tracing::info!(port = path, baudrate, "serial link opened");
        Ok(Self(port))
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl ScalePort for SerialLink {
    fn clear_input(&mut self) -> io::Result<()> {
        self.0.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}
