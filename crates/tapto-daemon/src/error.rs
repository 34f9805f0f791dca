use tapto_hardware::HardwareError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No reader detected")]
    NoReaderDetected,

    #[error("Reader error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Failed to install logger: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
