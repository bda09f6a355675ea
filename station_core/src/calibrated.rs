//! Baseline-relative readings.
//!
//! A `CalibratedView` pairs a reader with a sign convention. The baseline is
//! always supplied by the caller; the view stores nothing between calls.
use crate::error::ProxyError;
use crate::proxy::Reader;
use std::ops::Sub;

/// How a raw reading relates to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// `raw - base`: the quantity grows away from the baseline (scale tare).
    Tare,
    /// `base - raw`: the quantity grows towards the sensor, as with a
    /// downward-looking distance sensor measuring an object's top.
    Depth,
}

impl Convention {
    pub fn apply<T: Sub<Output = T>>(self, raw: T, base: T) -> T {
        match self {
            Self::Tare => raw - base,
            Self::Depth => base - raw,
        }
    }
}

/// Caller-facing capability: one fresh reading relative to `base`.
pub trait Calibratable<T> {
    fn obtain(&self, base: T) -> Result<T, ProxyError>;
}

#[derive(Debug)]
pub struct CalibratedView<R> {
    reader: R,
    convention: Convention,
}

impl<R> CalibratedView<R> {
    pub fn new(reader: R, convention: Convention) -> Self {
        Self { reader, convention }
    }

    pub fn tare(reader: R) -> Self {
        Self::new(reader, Convention::Tare)
    }

    pub fn depth(reader: R) -> Self {
        Self::new(reader, Convention::Depth)
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    pub fn inner(&self) -> &R {
        &self.reader
    }
}

impl<T, R: Reader<T>> Reader<T> for CalibratedView<R> {
    /// Raw passthrough, for capturing a baseline.
    fn read(&self) -> Result<T, ProxyError> {
        self.reader.read()
    }
}

impl<T: Sub<Output = T>, R: Reader<T>> Calibratable<T> for CalibratedView<R> {
    /// Exactly one device read per call.
    fn obtain(&self, base: T) -> Result<T, ProxyError> {
        let raw = self.reader.read()?;
        Ok(self.convention.apply(raw, base))
    }
}
