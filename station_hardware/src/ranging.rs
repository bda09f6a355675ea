//! Time-of-flight distance sensor on top of a raw `Ranger`.
use station_traits::{BoxError, Device, Ranger, Readable};

use crate::error::{HwError, Result};

/// Reports distances in centimetres. Ranging runs from `open` until `close`.
pub struct DistanceSensor<R: Ranger> {
    ranger: R,
    cm_per_unit: f32,
    ranging: bool,
}

impl<R: Ranger> DistanceSensor<R> {
    /// Start ranging at `level` (1 = short, 2 = medium, 3 = long).
    pub fn open(mut ranger: R, level: u8, cm_per_unit: f32) -> Result<Self> {
        ranger
            .start_ranging(level)
            .map_err(|e| HwError::Sensor(format!("start ranging: {e}")))?;
        tracing::debug!(level, "ranging started");
        Ok(Self {
            ranger,
            cm_per_unit,
            ranging: true,
        })
    }

    pub fn distance_cm(&mut self) -> Result<f32> {
        let units = self
            .ranger
            .distance_units()
            .map_err(|e| HwError::Sensor(e.to_string()))?;
        Ok(f32::from(units) * self.cm_per_unit)
    }
}

impl<R: Ranger> Device for DistanceSensor<R> {
    fn close(&mut self) -> std::result::Result<(), BoxError> {
        if std::mem::take(&mut self.ranging) {
            self.ranger
                .stop_ranging()
                .map_err(|e| HwError::Sensor(format!("stop ranging: {e}")))?;
            tracing::debug!("ranging stopped");
        }
        Ok(())
    }
}

impl<R: Ranger> Readable<f32> for DistanceSensor<R> {
    fn read(&mut self) -> std::result::Result<f32, BoxError> {
        Ok(self.distance_cm()?)
    }
}
