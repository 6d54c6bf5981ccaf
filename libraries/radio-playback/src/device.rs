//! Device state store
//!
//! Every caller-supplied device ID owns an independent session. Exactly one
//! device is active, meaning it is the one bound to the live backend slot.

use crate::sequencer::Cursor;
use crate::volume::DeviceVolume;
use radio_core::{DeviceId, FadeParams, PlaybackMode, PlaybackState, Position};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// One logical device's session
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    /// Selected channel key
    pub selected_key: Option<String>,

    pub mode: PlaybackMode,
    pub state: PlaybackState,

    /// File currently open, `None` while streaming or stopped
    pub current_track: Option<PathBuf>,

    pub cursor: Cursor,

    pub emitter: Position,
    pub listener: Position,

    /// Per-device fade radii replacing the global ones
    pub fade_override: Option<FadeParams>,

    pub volume: DeviceVolume,

    /// Message of the last failed command
    pub last_error: Option<String>,
}

impl DeviceState {
    /// Stop and rewind the session, keeping selection, positions, fade and volume
    pub fn reset_session(&mut self) {
        self.mode = PlaybackMode::None;
        self.state = PlaybackState::Stopped;
        self.current_track = None;
        self.cursor.reset();
    }

    /// Fade parameters in effect for this device
    pub fn fade_params(&self, global: FadeParams) -> FadeParams {
        self.fade_override.unwrap_or(global)
    }
}

/// Read-only snapshot of a device for hosts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub device: u64,
    pub channel_key: String,
    pub source_name: String,
    pub state: PlaybackState,
    pub mode: PlaybackMode,
    pub track: String,
    pub volume_percent: f32,
    pub last_error: Option<String>,
}

/// All device sessions plus the active device ID
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: HashMap<DeviceId, DeviceState>,
    active: DeviceId,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device bound to the live backend slot
    pub fn active_id(&self) -> DeviceId {
        self.active
    }

    /// Make `id` the active device; returns the previous one
    pub fn set_active(&mut self, id: DeviceId) -> DeviceId {
        self.devices.entry(id).or_default();
        std::mem::replace(&mut self.active, id)
    }

    /// Session of the active device, created on first use
    pub fn active(&mut self) -> &mut DeviceState {
        self.devices.entry(self.active).or_default()
    }

    /// Session of any device, created on first use
    pub fn get_mut(&mut self, id: DeviceId) -> &mut DeviceState {
        self.devices.entry(id).or_default()
    }

    /// Session of a device that has been seen before
    pub fn get(&self, id: DeviceId) -> Option<&DeviceState> {
        self.devices.get(&id)
    }

    /// Number of known devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
