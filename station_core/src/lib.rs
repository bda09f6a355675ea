#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Device proxies for the measuring station (hardware-agnostic).
//!
//! Every physical peripheral is reached through a proxy that owns the device
//! on a dedicated worker thread. The worker is started by the first request,
//! closes the device after an idle period, and is restarted transparently on
//! the next request.
//!
//! ## Architecture
//!
//! - **`ThreadedProxy`**: polls a `Readable` device and serves the freshest value (`proxy` module)
//! - **`RequestProxy`**: runs one-shot actions such as photo captures (`request` module)
//! - **Lifecycle**: worker generations, handoff and exit reasons (`worker` module)
//! - **Calibration**: tare and depth conventions over any `Reader` (`calibrated` module)
//! - **Refinement**: median smoothing applied by the worker (`refine` module)
//! - **Station**: scale, sensor, cameras and lights composed (`station`, `rig` modules)
//!
//! At most one device instance is open per proxy at any time: a new worker
//! generation waits for its predecessor to close the device before opening it.

pub mod calibrated;
pub mod config;
pub mod conversions;
pub mod error;
pub mod mocks;
pub mod proxy;
pub mod refine;
pub mod request;
pub mod rig;
pub mod station;
mod worker;

pub use calibrated::{Calibratable, CalibratedView, Convention};
pub use config::ProxyCfg;
pub use error::{ProxyError, Result};
pub use proxy::{Reader, ThreadedProxy};
pub use refine::{MedianWindow, Refine};
pub use request::{Actionable, RequestProxy};
pub use rig::{CameraRig, Shot};
pub use station::{Fault, MeasureRequest, Measurement, Station};
