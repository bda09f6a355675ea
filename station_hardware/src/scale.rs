//! Request/response protocol of the serial weighing scale.
//!
//! The host sends a single `r`; the scale answers with one line such as
//! `0.000,kg,\r\n`. The scale ignores requests that arrive faster than its
//! turnaround time, hence the configurable pause between commands.
use std::io::Write as _;
use std::time::Duration;

use station_traits::{BoxError, Clock, Device, MonotonicClock, Readable, ScalePort};

use crate::error::{HwError, Result};
use crate::util::{Pacer, read_line};

const REQUEST: &[u8] = b"r";
const MAX_LINE: usize = 64;

pub struct SerialScale<P: ScalePort, C: Clock = MonotonicClock> {
    port: P,
    pacer: Pacer<C>,
}

impl<P: ScalePort> SerialScale<P> {
    pub fn new(port: P, pause: Duration) -> Self {
        Self::with_clock(port, pause, MonotonicClock::new())
    }
}

impl<P: ScalePort, C: Clock> SerialScale<P, C> {
    pub fn with_clock(port: P, pause: Duration, clock: C) -> Self {
        Self {
            port,
            pacer: Pacer::new(clock, pause),
        }
    }

    /// One weight in kg.
    pub fn request(&mut self) -> Result<f32> {
        self.pacer.wait();
        self.port.clear_input()?;
        self.port.write_all(REQUEST)?;
        self.port.flush()?;
        let line = read_line(&mut self.port, MAX_LINE);
        self.pacer.mark();
        let kg = parse_weight(&line?)?;
        tracing::trace!(kg, "scale reading");
        Ok(kg)
    }

    pub fn into_port(self) -> P {
        self.port
    }
}

/// Parse a scale response line: the weight is the first comma-separated field.
pub fn parse_weight(line: &str) -> Result<f32> {
    let field = line.split(',').next().unwrap_or_default().trim();
    field
        .parse::<f32>()
        .ok()
        .filter(|kg| kg.is_finite())
        .ok_or_else(|| HwError::Parse(line.trim_end().to_string()))
}

impl<P: ScalePort, C: Clock> Device for SerialScale<P, C> {
    fn close(&mut self) -> std::result::Result<(), BoxError> {
        self.port.flush()?;
        tracing::debug!("scale link closed");
        Ok(())
    }
}

impl<P: ScalePort, C: Clock> Readable<f32> for SerialScale<P, C> {
    fn read(&mut self) -> std::result::Result<f32, BoxError> {
        Ok(self.request()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0.000,kg,\r", 0.0)]
    #[case("12.345,kg,", 12.345)]
    #[case(" -0.250 ,kg", -0.25)]
    #[case("7", 7.0)]
    fn parses_first_field(#[case] line: &str, #[case] expected: f32) {
        assert_eq!(parse_weight(line).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("ST,GS")]
    #[case(",kg,")]
    #[case("NaN,kg,")]
    fn rejects_garbage(#[case] line: &str) {
        assert!(matches!(parse_weight(line), Err(HwError::Parse(_))));
    }
}
