#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the measuring station.
//!
//! `Config` and its sections are deserialized from TOML and checked by
//! `Config::validate`. Only `[scale]` is mandatory; every other section has
//! workable defaults for a bench setup.
use serde::Deserialize;
use std::collections::BTreeMap;

/// Highest number of decimal places a reading may be rounded to.
pub const MAX_PRECISION: u32 = 6;

#[derive(Debug, Deserialize)]
pub struct ScaleCfg {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    /// Per-IO timeout on the serial link (ms).
    #[serde(default = "default_scale_timeout_ms")]
    pub timeout_ms: u64,
    /// Minimum gap between two scale commands (ms). The scale drops requests
    /// that arrive faster than its turnaround time.
    #[serde(default)]
    pub pause_ms: u64,
    /// Decimal places reported for weights.
    #[serde(default = "default_precision")]
    pub precision: u32,
}

fn default_baudrate() -> u32 {
    9600
}

fn default_scale_timeout_ms() -> u64 {
    1000
}

fn default_precision() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MeasureCfg {
    /// I2C bus number of the ToF sensor.
    pub bus: u8,
    /// I2C address of the ToF sensor.
    pub address: u16,
    /// Ranging mode passed to the sensor on open (1 = short, 2 = medium, 3 = long).
    pub range: u8,
    /// Number of samples the median window covers.
    pub sample_window: usize,
    pub precision: u32,
    /// Conversion factor from sensor units to centimetres.
    pub cm_per_unit: f32,
}

impl Default for MeasureCfg {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReadersCfg {
    /// Close a device after this long without requests (ms). 0 keeps it open.
    pub inactivity_timeout_ms: u64,
}

impl Default for ReadersCfg {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LightsCfg {
    /// BCM pin driving the ring light.
    pub pin: u8,
    /// Brightness used while photos are taken (0.0..=1.0).
    pub level: f32,
    /// Time to let the lights settle before capturing (ms).
    pub warmup_ms: u64,
}

impl Default for LightsCfg {
    fn default() -> Self {
        Self {
            pin: 18,
            level: 1.0,
            warmup_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PhotoCfg {
    /// Name used for cameras whose serial number is not in `names`.
    pub default_name: String,
    /// Folder photo sets are written to when the caller names none.
    pub folder: String,
    /// Camera serial number -> position name (e.g. "overhead", "side").
    pub names: BTreeMap<String, String>,
}

impl Default for PhotoCfg {
    fn default() -> Self {
        Self {
            default_name: "camera".to_string(),
            folder: "photos".to_string(),
            names: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub scale: ScaleCfg,
    #[serde(default)]
    pub measure: MeasureCfg,
    #[serde(default)]
    pub readers: ReadersCfg,
    #[serde(default)]
    pub lights: LightsCfg,
    #[serde(default)]
    pub photo: PhotoCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Scale
        if self.scale.port.trim().is_empty() {
            eyre::bail!("scale.port must not be empty");
        }
        if self.scale.baudrate == 0 {
            eyre::bail!("scale.baudrate must be > 0");
        }
        if self.scale.timeout_ms == 0 {
            eyre::bail!("scale.timeout_ms must be >= 1");
        }
        if self.scale.pause_ms > 60_000 {
            eyre::bail!("scale.pause_ms is unreasonably large (>60s)");
        }
        if self.scale.precision > MAX_PRECISION {
            eyre::bail!("scale.precision must be <= {MAX_PRECISION}");
        }

        // Measure
        if self.measure.sample_window == 0 {
            eyre::bail!("measure.sample_window must be >= 1");
        }
        if !(self.measure.cm_per_unit.is_finite() && self.measure.cm_per_unit > 0.0) {
            eyre::bail!("measure.cm_per_unit must be a positive number");
        }
        if self.measure.precision > MAX_PRECISION {
            eyre::bail!("measure.precision must be <= {MAX_PRECISION}");
        }
        if !(1..=3).contains(&self.measure.range) {
            eyre::bail!("measure.range must be in 1..=3");
        }

        // Readers: 0 is a valid value (no idle teardown)

        // Lights
        if !(0.0..=1.0).contains(&self.lights.level) {
            eyre::bail!("lights.level must be in [0.0, 1.0]");
        }

        // Photo
        if self.photo.default_name.trim().is_empty() {
            eyre::bail!("photo.default_name must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}
