//! Device assembly: config mapping and construction of the `Station`.
//!
//! Without the `hardware` feature every device is simulated. With it the
//! scale talks to a real serial port and the ring light drives a GPIO pin;
//! the ToF sensor and the cameras stay simulated in every build.

use station_core::config::{LightsCfg, PhotoCfg, ProxyCfg, ScaleCfg, SensorCfg};
use station_core::error::Result;
use station_core::rig::Camera;
use station_core::{CameraRig, MedianWindow, Station, ThreadedProxy};
use station_hardware::{DistanceSensor, SimulatedCamera, SimulatedRanger};
use station_traits::BoxError;

/// Distance reported by the simulated ranger, in sensor units.
const SIM_DISTANCE_UNITS: u16 = 500;
const SIM_CAMERAS: &str = "usb:001";

pub fn build_station(cfg: &station_config::Config) -> Result<Station> {
    let proxy: ProxyCfg = (&cfg.readers).into();
    let scale_cfg: ScaleCfg = (&cfg.scale).into();
    let sensor_cfg: SensorCfg = (&cfg.measure).into();
    let lights_cfg: LightsCfg = (&cfg.lights).into();
    let photo_cfg: PhotoCfg = (&cfg.photo).into();

    let builder = Station::builder()
        .with_scale(scale_proxy(proxy, &scale_cfg))
        .with_sensor(sensor_proxy(proxy, sensor_cfg))
        .with_cameras(camera_rig(proxy, photo_cfg))
        .with_weight_precision(scale_cfg.precision)
        .with_height_precision(sensor_cfg.precision);

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let builder = {
        use eyre::WrapErr as _;
        let lights = station_hardware::lights::GpioLights::new(lights_cfg.pin)
            .wrap_err_with(|| format!("open ring light on GPIO {}", lights_cfg.pin))?;
        builder.with_lights(lights, lights_cfg)
    };
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let builder = builder.with_lights(station_hardware::SimulatedLights::default(), lights_cfg);

    builder.try_build()
}

#[cfg(feature = "hardware")]
fn scale_proxy(proxy: ProxyCfg, cfg: &ScaleCfg) -> ThreadedProxy<f32> {
    use station_hardware::SerialScale;
    use station_hardware::serial::SerialLink;

    let cfg = cfg.clone();
    ThreadedProxy::new(
        "scale",
        proxy,
        move || -> std::result::Result<SerialScale<SerialLink>, BoxError> {
            let link = SerialLink::open(&cfg.port, cfg.baudrate, cfg.io_timeout)?;
            Ok(SerialScale::new(link, cfg.pause))
        },
    )
}

#[cfg(not(feature = "hardware"))]
fn scale_proxy(proxy: ProxyCfg, cfg: &ScaleCfg) -> ThreadedProxy<f32> {
    use station_hardware::{SerialScale, SimulatedScalePort};

    /// Weight reported unless `STATION_SIM_WEIGHT` is set.
    const SIM_WEIGHT_KG: f32 = 0.0;

    let weight = sim_env("STATION_SIM_WEIGHT")
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(SIM_WEIGHT_KG);
    let fail = sim_env("STATION_SIM_SCALE_OPEN_FAIL").is_some_and(|v| v == "1");
    let pause = cfg.pause;
    let port = cfg.port.clone();
    ThreadedProxy::new(
        "scale",
        proxy,
        move || -> std::result::Result<SerialScale<SimulatedScalePort>, BoxError> {
            if fail {
                return Err(format!("open {port}: simulated open failure").into());
            }
            Ok(SerialScale::new(SimulatedScalePort::new(weight), pause))
        },
    )
}

fn sensor_proxy(proxy: ProxyCfg, cfg: SensorCfg) -> ThreadedProxy<f32> {
    tracing::debug!(bus = cfg.bus, address = cfg.address, "using simulated ToF sensor");
    ThreadedProxy::refined(
        "sensor",
        proxy,
        move || {
            DistanceSensor::open(
                SimulatedRanger::new(SIM_DISTANCE_UNITS),
                cfg.range,
                cfg.cm_per_unit,
            )
            .map_err(BoxError::from)
        },
        MedianWindow::new(cfg.sample_window),
    )
}

fn camera_rig(proxy: ProxyCfg, photo: PhotoCfg) -> CameraRig {
    let ports = camera_ports(sim_env("STATION_SIM_CAMERAS").as_deref().unwrap_or(SIM_CAMERAS));
    CameraRig::new(
        proxy,
        photo,
        move || ports.clone(),
        |port: &str| {
            let camera: Camera = Box::new(SimulatedCamera::new(port));
            Ok(camera)
        },
    )
}

/// Parse a comma-separated port list; blanks are skipped.
fn camera_ports(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn sim_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
