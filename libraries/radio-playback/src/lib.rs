//! Radio Engine - Playback
//!
//! Platform-agnostic multi-device radio playback.
//!
//! This crate provides:
//! - Channel catalog built from `Playlists/`, `Stations/`, `FX/` and configured streams
//! - Track sequencing with ad and transition interleaving
//! - Distance fade and equal-power stereo pan
//! - Per-device sessions sharing one live backend slot
//! - Local and stream fallback chains over three backend kinds
//! - A single command worker with bounded, synchronous calls
//!
//! # Architecture
//!
//! `radio-playback` has no audio output dependency. Real players are plugged
//! in through [`BackendProvider`], which opens [`MediaHandle`]s for the
//! command, modern player and filter-graph backends.
//!
//! # Example: Fade levels
//!
//! ```rust
//! use radio_core::{FadeParams, Position};
//! use radio_playback::fade;
//!
//! let params = FadeParams {
//!     min_distance: 150.0,
//!     max_distance: 5000.0,
//!     pan_distance: 1200.0,
//! };
//! let radio = Position::new(0.0, 0.0, 0.0);
//! let player = Position::new(100.0, 0.0, 0.0);
//!
//! let levels = fade::compute(&radio, &player, &params, 1.0, false);
//! assert_eq!(levels.volume, 1000);
//! ```

#![forbid(unsafe_code)]

pub mod backend;
pub mod catalog;
pub mod chain;
pub mod device;
pub mod engine;
pub mod error;
pub mod fade;
pub mod sequencer;
mod state;
pub mod volume;

pub use backend::{Backend, BackendKind, BackendProvider, HandleStatus, LevelCommand, MediaHandle};
pub use catalog::{Catalog, ChannelEntry, SUPPORTED_EXTENSIONS};
pub use device::{DeviceState, DeviceStatus, DeviceStore};
pub use engine::{Completion, RadioEngine};
pub use error::{PlaybackError, Result};
pub use sequencer::{Cursor, SequencerSettings};
pub use volume::DeviceVolume;
