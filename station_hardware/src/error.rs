use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial error: {0}")]
    Serial(String),
    #[error("scale timeout")]
    Timeout,
    #[error("unparsable scale response: {0:?}")]
    Parse(String),
    #[error("distance sensor error: {0}")]
    Sensor(String),
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
