//! Error types for the playback engine
//!
//! Public engine operations never return these to callers directly: the
//! command boundary logs them, stores the message as the device's last error
//! and reports `false`.

use radio_core::RadioError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No channel has been selected on the device
    #[error("No channel selected")]
    NoChannelSelected,

    /// Channel lookup by name failed
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// The selected channel disappeared in a rescan
    #[error("Selected channel no longer exists: {0}")]
    ChannelMissing(String),

    /// Local channel without songs
    #[error("Channel has no songs: {0}")]
    NoSongs(String),

    /// `start` is only valid for stations
    #[error("Start requested for a playlist channel. Use play")]
    NotAStation,

    /// The sequencer produced no track
    #[error("Could not determine track")]
    NoTrack,

    /// Operation requires the Playing state
    #[error("Not playing")]
    NotPlaying,

    /// Operation requires the Paused state
    #[error("Not paused")]
    NotPaused,

    /// Invalid caller input forwarded from the core types
    #[error(transparent)]
    Core(#[from] RadioError),

    /// Category has nothing to cycle through
    #[error("No sources for category {0}")]
    NoSources(i32),

    /// Track selection on a stream
    #[error("Streaming source has no local track list")]
    StreamHasNoTracks,

    /// Empty track basename
    #[error("Empty track basename")]
    EmptyTrackName,

    /// Track basename did not match any song
    #[error("Track not found in selected source: {0}")]
    TrackNotFound(String),

    /// FX basename did not match any file
    #[error("FX file not found: {0}")]
    FxNotFound(String),

    /// Scan produced no channels
    #[error("Library scan found no channels")]
    EmptyLibrary,

    /// Stream channel with an empty URL
    #[error("Empty stream URL")]
    EmptyStreamUrl,

    /// A backend call failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Operation needs an open backend handle
    #[error("No backend is open")]
    BackendUnavailable,

    /// Both local backends failed to open a file
    #[error("All backends failed for: {0}")]
    LocalExhausted(String),

    /// Every stream candidate failed on every backend
    #[error("Stream play failed after all URL attempts: {0}")]
    StreamExhausted(String),

    /// A newer command requested an interrupt
    #[error("Interrupted by a newer command")]
    Interrupted,

    /// The sequencer ran off the end of a non-looping playlist
    #[error("Playback reached end of queue")]
    EndOfQueue,

    /// A command closure panicked
    #[error("Command panicked: {0}")]
    Panicked(String),

    /// Caller gave up waiting for the worker
    #[error("Timed out waiting for worker completion")]
    Timeout,

    /// The worker dropped the command without answering
    #[error("Worker stopped before completing the command")]
    WorkerGone,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
