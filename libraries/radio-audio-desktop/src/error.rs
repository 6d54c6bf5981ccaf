/// Desktop backend errors
use radio_playback::PlaybackError;
use thiserror::Error;

/// Result type for desktop audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// No default output device
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the output stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// Failed to pause the output stream
    #[error("Failed to pause stream: {0}")]
    PauseError(String),

    /// Container or codec failure
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The media has no playable audio track
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// HTTP connect or status failure
    #[error("Stream connection failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The operation does not apply to this handle
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The engine asked the open to stop
    #[error("Interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::PlayError(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for AudioError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioError::PauseError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AudioError::DecodeError(err.to_string())
    }
}

impl From<AudioError> for PlaybackError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Interrupted => PlaybackError::Interrupted,
            other => PlaybackError::Backend(other.to_string()),
        }
    }
}
