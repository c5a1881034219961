use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Corrupt payload in {context}: {reason}")]
    CorruptPayload { context: String, reason: String },

    #[error("Scan policy error: {0}")]
    Policy(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub fn corrupt(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorruptPayload {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
