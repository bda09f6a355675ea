//! A set of tethered cameras, one `RequestProxy` per port.
//!
//! Ports come from a caller-supplied lister and are re-read before every
//! photo set, so cameras may be plugged in or removed between sets.
use crate::config::{PhotoCfg, ProxyCfg};
use crate::error::ProxyError;
use crate::request::RequestProxy;
use station_traits::{BoxError, PhotoCamera};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub type Camera = Box<dyn PhotoCamera + Send>;
type Opener = Arc<dyn Fn(&str) -> Result<Camera, BoxError> + Send + Sync>;
type Lister = Box<dyn Fn() -> Vec<String> + Send + Sync>;

/// Outcome of one camera's part in a photo set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shot {
    pub port: String,
    pub outcome: Result<PathBuf, ProxyError>,
}

pub struct CameraRig {
    cfg: ProxyCfg,
    photo: Arc<PhotoCfg>,
    lister: Lister,
    opener: Opener,
    cameras: Mutex<BTreeMap<String, RequestProxy<Camera, PathBuf>>>,
}

impl std::fmt::Debug for CameraRig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraRig")
            .field("cfg", &self.cfg)
            .field("photo", &self.photo)
            .field("ports", &self.ports())
            .finish_non_exhaustive()
    }
}

impl CameraRig {
    /// `lister` reports the ports cameras are attached to; `opener` opens the
    /// camera on one port.
    pub fn new<L, O>(cfg: ProxyCfg, photo: PhotoCfg, lister: L, opener: O) -> Self
    where
        L: Fn() -> Vec<String> + Send + Sync + 'static,
        O: Fn(&str) -> Result<Camera, BoxError> + Send + Sync + 'static,
    {
        Self {
            cfg,
            photo: Arc::new(photo),
            lister: Box::new(lister),
            opener: Arc::new(opener),
            cameras: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn photo_cfg(&self) -> &PhotoCfg {
        &self.photo
    }

    /// Ports with a camera proxy, in port order.
    pub fn ports(&self) -> Vec<String> {
        self.cameras
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Take one photo per camera into `folder`, named `<stem>_<name>.jpg`
    /// where `name` comes from the camera's serial number.
    ///
    /// All cameras are triggered before any result is collected. Results are
    /// returned in port order.
    pub fn capture_set(&self, folder: &Path, stem: &str) -> Vec<Shot> {
        let mut cameras = self.cameras.lock().unwrap_or_else(PoisonError::into_inner);
        self.reconcile(&mut cameras);

        let triggered: Vec<(String, Result<(), ProxyError>)> = cameras
            .iter()
            .map(|(port, proxy)| {
                let photo = Arc::clone(&self.photo);
                let folder = folder.to_path_buf();
                let stem = stem.to_string();
                let sent = proxy.request_action(move |camera: &mut Camera| {
                    let serial = camera.serial_number()?;
                    let dest = folder.join(format!("{stem}_{}.jpg", photo.name_for(&serial)));
                    camera.capture_to(&dest)?;
                    Ok(dest)
                });
                (port.clone(), sent)
            })
            .collect();

        triggered
            .into_iter()
            .map(|(port, sent)| {
                let outcome = sent.and_then(|()| match cameras.get(&port) {
                    Some(proxy) => proxy.get_result(None),
                    None => Err(ProxyError::DeviceUnavailable),
                });
                if let Err(e) = &outcome {
                    tracing::warn!(port = %port, error = %e, "capture failed");
                }
                Shot { port, outcome }
            })
            .collect()
    }

    /// Stop every camera worker.
    pub fn stop(&self) {
        for proxy in self
            .cameras
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            proxy.stop();
        }
    }

    fn reconcile(&self, cameras: &mut BTreeMap<String, RequestProxy<Camera, PathBuf>>) {
        let ports = (self.lister)();
        cameras.retain(|port, _| {
            let keep = ports.contains(port);
            if !keep {
                tracing::info!(port = %port, "camera removed");
            }
            keep
        });
        for port in ports {
            if cameras.contains_key(&port) {
                continue;
            }
            tracing::info!(port = %port, "camera detected");
            let opener = Arc::clone(&self.opener);
            let target = port.clone();
            let proxy = RequestProxy::new(format!("camera:{port}"), self.cfg, move || {
                opener(&target)
            });
            cameras.insert(port, proxy);
        }
    }
}
