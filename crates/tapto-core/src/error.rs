use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid device string: {0}")]
    InvalidDeviceSpec(String),

    #[error("Invalid reader id: {0}")]
    UnknownReader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
