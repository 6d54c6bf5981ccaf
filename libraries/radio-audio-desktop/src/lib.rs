//! Desktop playback backends for the radio engine
//!
//! Implements the engine's `BackendProvider` seam on top of CPAL output and
//! Symphonia decoding.
//!
//! # Features
//!
//! - Local files and HTTP streams in every format Symphonia decodes
//! - Automatic sample rate conversion to the device rate (rubato)
//! - Per-channel gain for spatial pan, applied in the output callback
//! - Pause, resume, stop and restart-from-start for local files
//!
//! # Example
//!
//! ```no_run
//! use radio_audio_desktop::{DesktopProvider, DEFAULT_CONNECT_TIMEOUT};
//! use radio_core::RadioConfig;
//! use radio_playback::RadioEngine;
//! use radio_resolver::StreamResolver;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RadioConfig::default();
//! let resolver = StreamResolver::http(&config.resolver)?;
//! let provider = DesktopProvider::new(DEFAULT_CONNECT_TIMEOUT)?;
//!
//! let engine = RadioEngine::new(config, Box::new(provider), Arc::new(resolver));
//! engine.initialize();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod decoder;
mod error;
mod handle;
pub mod output;
mod provider;
pub mod stream;

pub use decoder::TrackDecoder;
pub use error::{AudioError, Result};
pub use handle::{gains_for, DesktopHandle, HandleKind};
pub use provider::{DesktopProvider, DEFAULT_CONNECT_TIMEOUT};
