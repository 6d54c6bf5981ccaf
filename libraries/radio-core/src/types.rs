//! Core value types shared across the engine

use crate::error::RadioError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest allowed gap between fade radii, and smallest pan distance
pub const MINIMUM_FADE_GAP: f32 = 1.0;

/// Opaque caller-supplied device identifier
///
/// The engine never interprets the value; a host typically passes an
/// in-world object handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Create a device ID from a raw handle
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw handle
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback state of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing open
    #[default]
    Stopped,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,
}

impl PlaybackState {
    /// Whether a track is open (playing or paused)
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Interleaving mode used while advancing
///
/// Independent of the channel's static type: forward/rewind may force a
/// station into playlist-style advance and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Not playing yet
    #[default]
    None,

    /// Plain song cycling
    Playlist,

    /// Songs interleaved with ads and transitions
    Station,
}

/// Static type of a catalog channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    /// Loops a single song list
    Playlist,

    /// Interleaves songs with ads/transitions
    Station,
}

impl ChannelType {
    /// Playback mode a fresh start of this channel uses
    pub fn playback_mode(self) -> PlaybackMode {
        match self {
            ChannelType::Playlist => PlaybackMode::Playlist,
            ChannelType::Station => PlaybackMode::Station,
        }
    }
}

/// Source category used by next-source cycling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceCategory {
    /// Local playlists (category 1)
    Playlists,

    /// Local stations (category 2)
    Stations,

    /// Configured stream stations (category 3)
    Streams,
}

impl SourceCategory {
    /// Numeric code used by hosts
    pub fn code(self) -> i32 {
        match self {
            SourceCategory::Playlists => 1,
            SourceCategory::Stations => 2,
            SourceCategory::Streams => 3,
        }
    }
}

impl TryFrom<i32> for SourceCategory {
    type Error = RadioError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SourceCategory::Playlists),
            2 => Ok(SourceCategory::Stations),
            3 => Ok(SourceCategory::Streams),
            other => Err(RadioError::InvalidCategory(other)),
        }
    }
}

/// A point in the host's 3D world
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    /// Create a new position
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        let dz = f64::from(other.z) - f64::from(self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Fade radii and pan width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeParams {
    /// Full volume at or below this distance
    pub min_distance: f32,

    /// Silent at or above this distance
    pub max_distance: f32,

    /// Lateral offset that maps to a hard left/right pan
    pub pan_distance: f32,
}

impl FadeParams {
    /// Build a per-device override from caller input
    ///
    /// Returns `None` when any value is negative, which callers treat as
    /// "reset all three to the global defaults". Otherwise the maximum is
    /// raised to at least `min + 1` and the pan distance to at least 1.
    pub fn from_request(min_distance: f32, max_distance: f32, pan_distance: f32) -> Option<Self> {
        if min_distance < 0.0 || max_distance < 0.0 || pan_distance < 0.0 {
            return None;
        }

        Some(Self {
            min_distance,
            max_distance: max_distance.max(min_distance + MINIMUM_FADE_GAP),
            pan_distance: pan_distance.max(MINIMUM_FADE_GAP),
        })
    }
}
