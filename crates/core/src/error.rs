use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlipError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("decoder bundle unavailable: {0:?}")]
    CapabilityUnavailable(PathBuf),
    #[error("decoder bundle not ready after {0} ms")]
    CapabilityTimeout(u64),
    #[error("decode call failed: {0}")]
    Decode(String),
    #[error("malformed literal: {0}")]
    Literal(String),
    #[error("config payload unrecoverable: {0}")]
    ConfigUnrecoverable(String),
}

pub type Result<T> = std::result::Result<T, FlipError>;
