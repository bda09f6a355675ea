use thiserror::Error;

/// Failures surfaced by the device proxies.
///
/// `DeviceRead`, `ActionFailed` and `Superseded` concern one operation; the
/// worker keeps serving afterwards. The remaining variants mean the worker
/// is gone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("device could not be opened: {0}")]
    DeviceOpen(String),
    #[error("device read failed: {0}")]
    DeviceRead(String),
    #[error("device action failed: {0}")]
    ActionFailed(String),
    #[error("worker exited before producing a result")]
    WorkerTerminated,
    #[error("device unavailable: worker is no longer running")]
    DeviceUnavailable,
    #[error("could not spawn worker thread: {0}")]
    WorkerSpawn(String),
    #[error("action was replaced by a later submission")]
    Superseded,
}

impl ProxyError {
    /// True when the error means no worker is serving the device any more.
    pub fn is_worker_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DeviceRead(_) | Self::ActionFailed(_) | Self::Superseded
        )
    }
}

/// Missing or inconsistent pieces when assembling a `Station`.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing scale")]
    MissingScale,
    #[error("missing distance sensor")]
    MissingSensor,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
