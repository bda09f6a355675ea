//! The measuring station: scale, height sensor, cameras and ring lights.
//!
//! `Station` is owned by the application and handed to whatever needs it.
//! `weigh`/`height`/`capture` report errors; `measure` applies the fallback
//! policy of the station itself (zero or no photos, with the failure recorded
//! in `Measurement::faults`).
use crate::calibrated::{Calibratable, CalibratedView};
use crate::config::LightsCfg;
use crate::error::{BuildError, ProxyError, Result};
use crate::proxy::{Reader, ThreadedProxy};
use crate::rig::{CameraRig, Shot};
use eyre::WrapErr;
use station_traits::clock::{Clock, MonotonicClock};
use station_traits::{BoxError, Lights};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

pub use station_config::MAX_PRECISION;

/// Inputs of one composite measurement. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureRequest {
    /// Scale reading of the empty platform, in kg.
    pub tare: Option<f32>,
    /// Sensor reading of the empty platform, in cm.
    pub base: Option<f32>,
    /// Use this height instead of reading the sensor.
    pub height_override: Option<f32>,
    pub folder: Option<PathBuf>,
    pub stem: Option<String>,
}

/// A part of a measurement that could not be taken and was substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// `scale`, `sensor`, `lights`, `photos` or `camera:<port>`.
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub weight: f32,
    pub height: f32,
    pub photos: Vec<PathBuf>,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub faults: Vec<Fault>,
}

pub struct Station {
    scale: CalibratedView<ThreadedProxy<f32>>,
    sensor: CalibratedView<ThreadedProxy<f32>>,
    rig: Option<CameraRig>,
    lights: Mutex<Box<dyn Lights + Send>>,
    lights_cfg: LightsCfg,
    weight_precision: u32,
    height_precision: u32,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("scale", self.scale.inner())
            .field("sensor", self.sensor.inner())
            .field("cameras", &self.rig.is_some())
            .field("lights_cfg", &self.lights_cfg)
            .finish_non_exhaustive()
    }
}

impl Station {
    pub fn builder() -> StationBuilder {
        StationBuilder::default()
    }

    /// Current weight in kg: raw without `tare`, `raw - tare` with it.
    pub fn weigh(&self, tare: Option<f32>) -> std::result::Result<f32, ProxyError> {
        let kg = match tare {
            Some(tare) => self.scale.obtain(tare)?,
            None => self.scale.read()?,
        };
        Ok(round_to(kg, self.weight_precision))
    }

    /// Current height in cm: the raw sensor distance without `base`,
    /// `base - raw` with it.
    pub fn height(&self, base: Option<f32>) -> std::result::Result<f32, ProxyError> {
        let cm = match base {
            Some(base) => self.sensor.obtain(base)?,
            None => self.sensor.read()?,
        };
        Ok(round_to(cm, self.height_precision))
    }

    /// Take one photo set with the ring lights on.
    ///
    /// The folder is created if needed. The lights are switched off again
    /// whatever the cameras report. Without cameras the set is empty.
    pub fn capture(&self, folder: Option<&Path>, stem: Option<&str>) -> Result<Vec<Shot>> {
        let Some(rig) = &self.rig else {
            return Ok(Vec::new());
        };
        let folder = folder.unwrap_or(&rig.photo_cfg().folder);
        std::fs::create_dir_all(folder)
            .wrap_err_with(|| format!("create photo folder {}", folder.display()))?;
        let stem = match stem {
            Some(s) => s.to_string(),
            None => unix_now().to_string(),
        };

        let mut lights = self.lights.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = lights.set_level(self.lights_cfg.level) {
            tracing::warn!(error = %e, "could not switch lights on");
        }
        self.clock.sleep(self.lights_cfg.warmup);
        let shots = rig.capture_set(folder, &stem);
        if let Err(e) = lights.off() {
            tracing::warn!(error = %e, "could not switch lights off");
        }
        Ok(shots)
    }

    /// Weight, height and photos in one record. Never fails: anything that
    /// could not be read is substituted and listed in `faults`.
    pub fn measure(&self, req: &MeasureRequest) -> Measurement {
        let mut faults = Vec::new();

        let weight = self.weigh(req.tare).unwrap_or_else(|e| {
            tracing::error!(error = %e, "scale unavailable, reporting 0");
            faults.push(Fault::new("scale", &e));
            0.0
        });

        let height = match req.height_override {
            Some(h) => round_to(h, self.height_precision),
            None => self.height(req.base).unwrap_or_else(|e| {
                tracing::error!(error = %e, "sensor unavailable, reporting 0");
                faults.push(Fault::new("sensor", &e));
                0.0
            }),
        };

        let photos = match self.capture(req.folder.as_deref(), req.stem.as_deref()) {
            Ok(shots) => shots
                .into_iter()
                .filter_map(|shot| match shot.outcome {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::error!(port = %shot.port, error = %e, "photo missing from set");
                        faults.push(Fault::new(format!("camera:{}", shot.port), &e));
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "photo set failed");
                faults.push(Fault::new("photos", &e));
                Vec::new()
            }
        };

        Measurement {
            weight,
            height,
            photos,
            timestamp: unix_now(),
            faults,
        }
    }

    /// Stop every worker and switch the lights off.
    pub fn stop(&self) {
        self.scale.inner().stop();
        self.sensor.inner().stop();
        if let Some(rig) = &self.rig {
            rig.stop();
        }
        if let Err(e) = self
            .lights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .off()
        {
            tracing::warn!(error = %e, "could not switch lights off");
        }
    }

    pub fn scale(&self) -> &ThreadedProxy<f32> {
        self.scale.inner()
    }

    pub fn sensor(&self) -> &ThreadedProxy<f32> {
        self.sensor.inner()
    }

    pub fn cameras(&self) -> Option<&CameraRig> {
        self.rig.as_ref()
    }
}

impl Fault {
    fn new(source: impl Into<String>, error: &dyn std::fmt::Display) -> Self {
        Self {
            source: source.into(),
            message: error.to_string(),
        }
    }
}

/// Lights that do nothing, for stations without a ring light.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLights;

impl Lights for NoLights {
    fn set_level(&mut self, _level: f32) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct StationBuilder {
    scale: Option<ThreadedProxy<f32>>,
    sensor: Option<ThreadedProxy<f32>>,
    rig: Option<CameraRig>,
    lights: Option<Box<dyn Lights + Send>>,
    lights_cfg: Option<LightsCfg>,
    weight_precision: Option<u32>,
    height_precision: Option<u32>,
    clock: Option<Arc<dyn Clock>>,
}

impl StationBuilder {
    pub fn with_scale(mut self, scale: ThreadedProxy<f32>) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_sensor(mut self, sensor: ThreadedProxy<f32>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_cameras(mut self, rig: CameraRig) -> Self {
        self.rig = Some(rig);
        self
    }

    pub fn with_lights(mut self, lights: impl Lights + Send + 'static, cfg: LightsCfg) -> Self {
        self.lights = Some(Box::new(lights));
        self.lights_cfg = Some(cfg);
        self
    }

    pub fn with_weight_precision(mut self, decimals: u32) -> Self {
        self.weight_precision = Some(decimals);
        self
    }

    pub fn with_height_precision(mut self, decimals: u32) -> Self {
        self.height_precision = Some(decimals);
        self
    }

    /// Clock used for the lights warm-up; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn try_build(self) -> Result<Station> {
        let scale = self
            .scale
            .ok_or_else(|| eyre::Report::new(BuildError::MissingScale))?;
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let weight_precision = self.weight_precision.unwrap_or(3);
        let height_precision = self.height_precision.unwrap_or(1);
        if weight_precision > MAX_PRECISION || height_precision > MAX_PRECISION {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "precision must be <= 6",
            )));
        }
        let lights_cfg = self.lights_cfg.unwrap_or_default();
        if !(0.0..=1.0).contains(&lights_cfg.level) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "lights level must be in [0.0, 1.0]",
            )));
        }

        Ok(Station {
            scale: CalibratedView::tare(scale),
            sensor: CalibratedView::depth(sensor),
            rig: self.rig,
            lights: Mutex::new(self.lights.unwrap_or_else(|| Box::new(NoLights))),
            lights_cfg,
            weight_precision,
            height_precision,
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
        })
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f32, decimals: u32) -> f32 {
    let factor = 10f64.powi(decimals.min(MAX_PRECISION) as i32);
    ((f64::from(value) * factor).round() / factor) as f32
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
