//! Runtime configuration for the proxies and the station.
//!
//! These are separate from the TOML-deserialized config in `station_config`;
//! see `conversions` for the mapping.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Lifecycle settings shared by both proxy flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyCfg {
    /// Tear the worker down after this long without requests.
    /// `None` keeps the device open until `stop()`.
    ///
    /// This is a lower bound: a `ThreadedProxy` worker only checks it between
    /// device reads, so a slow read stretches the effective window.
    pub idle_timeout: Option<Duration>,
    /// Start the worker on construction instead of on first use.
    pub eager: bool,
}

impl Default for ProxyCfg {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(30)),
            eager: false,
        }
    }
}

impl ProxyCfg {
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout: Some(idle_timeout),
            ..Self::default()
        }
    }

    /// Never tear down for inactivity.
    pub fn persistent() -> Self {
        Self {
            idle_timeout: None,
            ..Self::default()
        }
    }
}

/// Weighing scale link settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleCfg {
    pub port: String,
    pub baudrate: u32,
    /// Per-IO timeout configured on the serial link itself.
    pub io_timeout: Duration,
    /// Minimum gap between two scale commands.
    pub pause: Duration,
    /// Decimal places reported for weights.
    pub precision: u32,
}

impl Default for ScaleCfg {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
            io_timeout: Duration::from_secs(1),
            pause: Duration::ZERO,
            precision: 3,
        }
    }
}

/// Distance sensor settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorCfg {
    pub bus: u8,
    pub address: u16,
    pub range: u8,
    /// Median window length (1 = no smoothing).
    pub sample_window: usize,
    pub precision: u32,
    pub cm_per_unit: f32,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x29,
            range: 1,
            sample_window: 5,
            precision: 1,
            cm_per_unit: 0.1,
        }
    }
}

/// Ring-light behaviour around a photo set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightsCfg {
    pub pin: u8,
    pub level: f32,
    pub warmup: Duration,
}

impl Default for LightsCfg {
    fn default() -> Self {
        Self {
            pin: 18,
            level: 1.0,
            warmup: Duration::from_millis(500),
        }
    }
}

/// Photo naming and placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoCfg {
    pub default_name: String,
    pub folder: PathBuf,
    /// Camera serial number -> position name.
    pub names: BTreeMap<String, String>,
}

impl Default for PhotoCfg {
    fn default() -> Self {
        Self {
            default_name: "camera".to_string(),
            folder: PathBuf::from("photos"),
            names: BTreeMap::new(),
        }
    }
}

impl PhotoCfg {
    pub fn name_for(&self, serial: &str) -> &str {
        self.names
            .get(serial)
            .map_or(self.default_name.as_str(), String::as_str)
    }
}
