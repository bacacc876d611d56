use thiserror::Error;

pub type TamperResult<T> = Result<T, TamperError>;

#[derive(Error, Debug)]
pub enum TamperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source failure for stream '{stream}': {reason}")]
    Source { stream: String, reason: String },

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Alert not found: {0}")]
    AlertNotFound(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
