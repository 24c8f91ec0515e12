use crate::paths::BaseDir;
use tether_core::OpaquePointer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0:?} is not a base directory pointer")]
    UnknownBaseDir(OpaquePointer),

    #[error("no {0} on this platform")]
    NoBaseDir(BaseDir),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
