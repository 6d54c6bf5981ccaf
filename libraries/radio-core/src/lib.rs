//! Radio Engine Core
//!
//! Platform-agnostic types, configuration and error handling shared by every
//! radio engine crate.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `DeviceId`, `PlaybackState`, `PlaybackMode`, `ChannelType`, `Position`
//! - **Configuration**: `RadioConfig` with defaults, normalization and file/env loading
//! - **Cancellation**: the shared `Interrupt` flag checked by slow network operations
//! - **Error Handling**: `RadioError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use radio_core::{DeviceId, Position, RadioConfig};
//!
//! let config = RadioConfig::from_toml_str(
//!     r#"
//!     root_path = "Data/Radio"
//!     ad_interval_songs = 2
//!     stream_station = ["Jazz FM|http://example.com/jazz.pls"]
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.ad_interval_songs, 2);
//! assert_eq!(config.stream_stations[0].name, "Jazz FM");
//!
//! let device = DeviceId::new(7);
//! let emitter = Position::new(0.0, 0.0, 0.0);
//! assert_eq!(emitter.distance_to(&Position::new(3.0, 4.0, 0.0)), 5.0);
//! # let _ = device;
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod interrupt;
pub mod types;

pub use config::{EngineSettings, RadioConfig, ResolverSettings, StreamStation};
pub use error::{RadioError, Result};
pub use interrupt::Interrupt;
pub use types::{
    ChannelType, DeviceId, FadeParams, PlaybackMode, PlaybackState, Position, SourceCategory,
    MINIMUM_FADE_GAP,
};
