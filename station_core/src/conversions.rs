//! `From` implementations bridging `station_config` types to `station_core` types.

use crate::config::{LightsCfg, PhotoCfg, ProxyCfg, ScaleCfg, SensorCfg};
use std::time::Duration;

// ── ProxyCfg ─────────────────────────────────────────────────────────────────

impl From<&station_config::ReadersCfg> for ProxyCfg {
    fn from(c: &station_config::ReadersCfg) -> Self {
        Self {
            idle_timeout: (c.inactivity_timeout_ms > 0)
                .then(|| Duration::from_millis(c.inactivity_timeout_ms)),
            eager: false,
        }
    }
}

// ── ScaleCfg ─────────────────────────────────────────────────────────────────

impl From<&station_config::ScaleCfg> for ScaleCfg {
    fn from(c: &station_config::ScaleCfg) -> Self {
        Self {
            port: c.port.clone(),
            baudrate: c.baudrate,
            io_timeout: Duration::from_millis(c.timeout_ms),
            pause: Duration::from_millis(c.pause_ms),
            precision: c.precision,
        }
    }
}

// ── SensorCfg ────────────────────────────────────────────────────────────────

impl From<&station_config::MeasureCfg> for SensorCfg {
    fn from(c: &station_config::MeasureCfg) -> Self {
        Self {
            bus: c.bus,
            address: c.address,
            range: c.range,
            sample_window: c.sample_window.max(1),
            precision: c.precision,
            cm_per_unit: c.cm_per_unit,
        }
    }
}

// ── LightsCfg ────────────────────────────────────────────────────────────────

impl From<&station_config::LightsCfg> for LightsCfg {
    fn from(c: &station_config::LightsCfg) -> Self {
        Self {
            pin: c.pin,
            level: c.level.clamp(0.0, 1.0),
            warmup: Duration::from_millis(c.warmup_ms),
        }
    }
}

// ── PhotoCfg ─────────────────────────────────────────────────────────────────

impl From<&station_config::PhotoCfg> for PhotoCfg {
    fn from(c: &station_config::PhotoCfg) -> Self {
        Self {
            default_name: c.default_name.clone(),
            folder: c.folder.clone().into(),
            names: c.names.clone(),
        }
    }
}
