/// Core error types for the radio engine
use thiserror::Error;

/// Result type alias using `RadioError`
pub type Result<T> = std::result::Result<T, RadioError>;

/// Core error type
#[derive(Error, Debug)]
pub enum RadioError {
    /// Configuration could not be built or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// TOML text could not be parsed
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// A `stream_station` entry is malformed
    #[error("Invalid stream station entry: {0}")]
    InvalidStreamStation(String),

    /// Unknown next-source category
    #[error("Invalid source category: {0}")]
    InvalidCategory(i32),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
