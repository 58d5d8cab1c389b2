use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid period: {0} ms (must be greater than 0)")]
    InvalidPeriod(u64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
