//! Engine state and the operations the worker runs
//!
//! Everything here executes with the engine lock held, on the worker thread
//! once it is running. Operations act on the active device; the dispatcher
//! switches the active device before running a command for another one.

use crate::backend::{AppliedLevels, Backend, BackendProvider, MediaHandle, PanSupport};
use crate::catalog::{Catalog, ChannelEntry};
use crate::chain;
use crate::device::{DeviceState, DeviceStatus, DeviceStore};
use crate::error::{PlaybackError, Result};
use crate::fade;
use crate::sequencer::{self, SequencerSettings};
use crate::volume::DEFAULT_VOLUME_PERCENT;
use radio_core::{
    ChannelType, DeviceId, FadeParams, Interrupt, PlaybackMode, PlaybackState, Position, RadioConfig,
    SourceCategory,
};
use radio_resolver::ResolveUrl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rewind restarts the current track instead of stepping back past this position
const REWIND_RESTART_THRESHOLD: Duration = Duration::from_millis(3000);

/// A queued unit of work
pub(crate) type Job = Box<dyn FnOnce(&mut EngineCore) -> Result<()> + Send>;

/// Bindings that belong to whichever device is active
#[derive(Debug, Default)]
struct LiveSlot {
    backend: Backend,
    last_levels: Option<AppliedLevels>,
    pan: PanSupport,
    started: Option<Instant>,
}

impl LiveSlot {
    fn close(&mut self) {
        self.backend.close();
        self.last_levels = None;
        self.started = None;
    }

    fn reset(&mut self) {
        self.close();
        self.pan = PanSupport::default();
    }
}

/// All engine state behind the engine lock
pub(crate) struct EngineCore {
    config: RadioConfig,
    catalog: Catalog,
    devices: DeviceStore,
    live: LiveSlot,
    fx: Option<Box<dyn MediaHandle>>,
    provider: Box<dyn BackendProvider>,
    resolver: Arc<dyn ResolveUrl>,
    interrupt: Interrupt,
}

impl EngineCore {
    pub(crate) fn new(
        config: RadioConfig,
        provider: Box<dyn BackendProvider>,
        resolver: Arc<dyn ResolveUrl>,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            config,
            catalog: Catalog::default(),
            devices: DeviceStore::new(),
            live: LiveSlot::default(),
            fx: None,
            provider,
            resolver,
            interrupt,
        }
    }

    pub(crate) fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Run one command; errors become `false` plus the device's last error
    pub(crate) fn dispatch(&mut self, device: Option<DeviceId>, name: &str, job: Job) -> bool {
        if let Some(id) = device {
            self.switch_device(id);
        }
        self.interrupt.clear();

        let result = job(self);
        self.record(device, name, result)
    }

    pub(crate) fn record(&mut self, device: Option<DeviceId>, name: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                if let Some(id) = device {
                    self.devices.get_mut(id).last_error = None;
                }
                true
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", name, e);
                if let Some(id) = device {
                    self.devices.get_mut(id).last_error = Some(e.to_string());
                }
                false
            }
        }
    }

    /// Bind the live slot to `id`
    ///
    /// A playing or paused previous device is stopped; its cursor, volume
    /// and selection are kept.
    fn switch_device(&mut self, id: DeviceId) {
        if self.devices.active_id() == id {
            return;
        }

        let previous = self.devices.active();
        if previous.state.is_active() {
            previous.state = PlaybackState::Stopped;
            previous.current_track = None;
        }
        self.live.reset();

        self.devices.set_active(id);
        let next = self.devices.active();
        if next.state != PlaybackState::Stopped {
            next.state = PlaybackState::Stopped;
            next.current_track = None;
        }
        tracing::debug!("Active radio device is now {}", id);
    }

    fn sequencer_settings(&self) -> SequencerSettings {
        SequencerSettings {
            loop_playlist: self.config.loop_playlist,
            ad_interval: self.config.ad_interval_songs,
        }
    }

    fn selected_channel(&mut self) -> Result<Arc<ChannelEntry>> {
        let key = self
            .devices
            .active()
            .selected_key
            .clone()
            .ok_or(PlaybackError::NoChannelSelected)?;
        self.catalog
            .get(&key)
            .cloned()
            .ok_or(PlaybackError::ChannelMissing(key))
    }

    // Library

    /// Rebuild the catalog from disk and configuration
    pub(crate) fn rescan(&mut self) -> Result<()> {
        self.catalog = Catalog::scan(&self.config);
        if self.catalog.is_empty() {
            return Err(PlaybackError::EmptyLibrary);
        }
        tracing::info!("Radio library scan complete. Channels: {}", self.catalog.len());
        Ok(())
    }

    // Source selection

    fn rescan_before_selection(&mut self) {
        if self.config.auto_rescan_on_change_playlist {
            if let Err(e) = self.rescan() {
                tracing::warn!("Rescan before channel change failed: {}", e);
            }
        }
    }

    pub(crate) fn change_playlist(&mut self, name: &str) -> Result<()> {
        self.rescan_before_selection();

        let channel = self
            .catalog
            .lookup(name)
            .ok_or_else(|| PlaybackError::ChannelNotFound(name.trim().to_string()))?;
        self.select(&channel);

        tracing::info!(
            "change_playlist selected: {} ({})",
            channel.display_name,
            channel.source_kind()
        );
        Ok(())
    }

    /// Select a source from a category
    ///
    /// With `after_current` the source following the selected one is
    /// picked, wrapping at the end; otherwise the first one.
    pub(crate) fn select_source(&mut self, code: i32, after_current: bool) -> Result<()> {
        let category = SourceCategory::try_from(code)?;
        self.rescan_before_selection();
        let sources = self.catalog.sources(category);
        if sources.is_empty() {
            return Err(PlaybackError::NoSources(code));
        }

        let index = if after_current {
            let selected = self.devices.active().selected_key.clone();
            selected
                .and_then(|key| sources.iter().position(|source| source.key == key))
                .map_or(0, |current| (current + 1) % sources.len())
        } else {
            0
        };
        let channel = Arc::clone(&sources[index]);
        self.select(&channel);

        let operation = if after_current {
            "select_next_source"
        } else {
            "change_to_next_source"
        };
        tracing::info!(
            "{} selected: {} ({}, category={}). Playback stopped; waiting for explicit play/start.",
            operation,
            channel.display_name,
            channel.source_kind(),
            code
        );
        Ok(())
    }

    fn select(&mut self, channel: &ChannelEntry) {
        self.live.reset();
        let device = self.devices.active();
        device.selected_key = Some(channel.key.clone());
        device.reset_session();
    }

    // Transport

    pub(crate) fn play(&mut self) -> Result<()> {
        if self.devices.active().selected_key.is_none() {
            return Err(PlaybackError::NoChannelSelected);
        }
        if self.devices.active().state == PlaybackState::Paused {
            return self.resume();
        }

        let channel = self.selected_channel()?;
        self.start_current(&channel, channel.channel_type.playback_mode(), false)
    }

    /// Cold start of a station from its first song
    pub(crate) fn start(&mut self) -> Result<()> {
        let channel = self.selected_channel()?;
        if channel.channel_type != ChannelType::Station {
            return Err(PlaybackError::NotAStation);
        }
        self.start_current(&channel, PlaybackMode::Station, true)
    }

    fn start_current(&mut self, channel: &ChannelEntry, mode: PlaybackMode, reset: bool) -> Result<()> {
        if !channel.is_stream() && channel.songs.is_empty() {
            return Err(PlaybackError::NoSongs(channel.display_name.clone()));
        }

        let settings = self.sequencer_settings();
        let device = self.devices.active();
        device.mode = mode;
        if reset {
            device.cursor.rewind_indices();
        }
        if mode == PlaybackMode::Station {
            device.cursor.previous_was_song = true;
        }

        if channel.is_stream() {
            return self.play_stream(channel);
        }

        let track = sequencer::current_track(channel, &device.cursor, mode, &settings)
            .ok_or(PlaybackError::NoTrack)?;
        self.play_path(&track)
    }

    pub(crate) fn pause(&mut self) -> Result<()> {
        if self.devices.active().state != PlaybackState::Playing {
            return Err(PlaybackError::NotPlaying);
        }
        self.live.backend.pause()?;
        self.devices.active().state = PlaybackState::Paused;
        tracing::info!("Playback paused.");
        Ok(())
    }

    pub(crate) fn resume(&mut self) -> Result<()> {
        if self.devices.active().state != PlaybackState::Paused {
            return Err(PlaybackError::NotPaused);
        }
        self.live.backend.resume()?;
        self.devices.active().state = PlaybackState::Playing;
        tracing::info!("Playback resumed.");
        self.update_fade();
        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        self.live.reset();
        self.devices.active().reset_session();
        tracing::info!("stop executed. Playback reset to beginning.");
        Ok(())
    }

    pub(crate) fn forward(&mut self) -> Result<()> {
        let channel = self.selected_channel()?;
        if channel.is_stream() {
            tracing::info!("forward -> restart stream.");
            self.devices.active().mode = PlaybackMode::Station;
            return self.play_stream(&channel);
        }

        let count = channel.songs.len();
        if count == 0 {
            return Err(PlaybackError::NoSongs(channel.display_name.clone()));
        }

        let settings = self.sequencer_settings();
        let device = self.devices.active();
        device.cursor.song_index = (device.cursor.song_index + 1) % count;
        if device.mode == PlaybackMode::Station || channel.channel_type == ChannelType::Station {
            device.cursor.previous_was_song = true;
            device.mode = PlaybackMode::Station;
        } else {
            device.mode = PlaybackMode::Playlist;
        }

        let track = sequencer::current_track(&channel, &device.cursor, device.mode, &settings)
            .ok_or(PlaybackError::NoTrack)?;
        tracing::info!("forward -> {}", track.display());
        self.play_path(&track)
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        let channel = self.selected_channel()?;
        if channel.is_stream() {
            tracing::info!("rewind -> restart stream.");
            self.devices.active().mode = PlaybackMode::Station;
            return self.play_stream(&channel);
        }

        let keep_paused = self.devices.active().state == PlaybackState::Paused;
        if self.live.backend.restart_if_past(REWIND_RESTART_THRESHOLD, keep_paused) {
            self.live.started = Some(Instant::now());
            tracing::info!("rewind -> restart current track.");
            return Ok(());
        }

        let count = channel.songs.len();
        if count == 0 {
            return Err(PlaybackError::NoSongs(channel.display_name.clone()));
        }

        let settings = self.sequencer_settings();
        let device = self.devices.active();
        let index = device.cursor.song_index.min(count - 1);
        device.cursor.song_index = if index == 0 { count - 1 } else { index - 1 };
        device.cursor.previous_was_song = true;
        if device.mode == PlaybackMode::None {
            device.mode = channel.channel_type.playback_mode();
        }

        let track = sequencer::current_track(&channel, &device.cursor, device.mode, &settings)
            .ok_or(PlaybackError::NoTrack)?;
        tracing::info!("rewind -> {}", track.display());
        self.play_path(&track)
    }

    // Rendering

    fn play_path(&mut self, path: &Path) -> Result<()> {
        self.live.close();

        let started = chain::start_local(
            self.provider.as_mut(),
            path,
            &self.interrupt,
            &self.config.engine,
        );
        let backend = match started {
            Ok(backend) => backend,
            Err(e) => {
                let device = self.devices.active();
                device.state = PlaybackState::Stopped;
                device.current_track = None;
                return Err(e);
            }
        };

        self.begin(backend, Some(path.to_path_buf()));
        Ok(())
    }

    fn play_stream(&mut self, channel: &ChannelEntry) -> Result<()> {
        self.live.close();

        let url = channel.stream_url.as_deref().unwrap_or_default();
        let started = chain::start_stream(
            self.provider.as_mut(),
            self.resolver.as_ref(),
            url,
            &self.interrupt,
            &self.config.engine,
            self.config.verbose_stream_diagnostics,
        );
        let stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                let device = self.devices.active();
                device.state = PlaybackState::Stopped;
                device.current_track = None;
                return Err(e);
            }
        };

        tracing::debug!("Stream {} bound to {:?}", stream.url, stream.backend);
        self.begin(stream.backend, None);
        Ok(())
    }

    fn begin(&mut self, backend: Backend, track: Option<PathBuf>) {
        self.live.backend = backend;
        self.live.started = Some(Instant::now());
        self.live.last_levels = None;

        let device = self.devices.active();
        device.current_track = track;
        device.state = PlaybackState::Playing;

        self.stop_fx_handle();
        self.update_fade();
    }

    /// Whether the live media has finished, outside the start grace period
    fn is_complete(&mut self) -> bool {
        if self.devices.active().state != PlaybackState::Playing {
            return false;
        }
        let grace = self.live.backend.grace_period(&self.config.engine);
        if self.live.started.is_some_and(|started| started.elapsed() < grace) {
            return false;
        }
        self.live.backend.is_complete()
    }

    /// Continue after the live media completed
    fn update_track(&mut self) -> Result<()> {
        if self.devices.active().state != PlaybackState::Playing {
            return Ok(());
        }

        let channel = self.selected_channel()?;
        if channel.is_stream() {
            tracing::info!("Stream ended/disconnected, reconnecting: {}", channel.display_name);
            return self.play_stream(&channel);
        }

        let settings = self.sequencer_settings();
        let device = self.devices.active();
        if device.mode == PlaybackMode::None {
            device.mode = channel.channel_type.playback_mode();
        }
        match sequencer::advance(&channel, &mut device.cursor, device.mode, &settings) {
            Some(next) => self.play_path(&next),
            None => {
                self.live.close();
                let device = self.devices.active();
                device.state = PlaybackState::Stopped;
                device.current_track = None;
                tracing::info!("Playback reached end of queue.");
                Ok(())
            }
        }
    }

    /// One maintenance pass: advance on completion, otherwise refresh levels
    pub(crate) fn tick(&mut self) {
        if self.devices.active().state != PlaybackState::Playing {
            return;
        }

        if self.is_complete() {
            let id = self.devices.active_id();
            let result = self.update_track();
            self.record(Some(id), "update_track", result);
        } else {
            self.update_fade();
        }
    }

    // Levels

    /// Push fade levels to the live backend unless they are unchanged
    fn update_fade(&mut self) {
        let device = self.devices.active();
        if device.state != PlaybackState::Playing || !self.live.backend.is_open() {
            return;
        }

        let params = device.fade_params(self.config.fade_params());
        let gain = device.volume.gain();
        let spatial_pan = self.config.enable_spatial_pan;
        let levels = fade::compute(&device.emitter, &device.listener, &params, gain, spatial_pan);

        let planned = self.live.backend.effective_levels(&levels, self.live.pan, spatial_pan);
        if self.live.last_levels == Some(planned) {
            return;
        }

        match self.live.backend.apply_levels(&levels, &mut self.live.pan, spatial_pan) {
            Ok(applied) => {
                self.live.last_levels = Some(applied);
                if self.config.log_fade_changes {
                    tracing::info!(
                        "Fade update: distance={:.1} baseVol={} leftVol={} rightVol={} pan={:.3} gain={:.2}",
                        levels.distance,
                        applied.volume,
                        applied.left,
                        applied.right,
                        levels.pan,
                        gain
                    );
                }
            }
            Err(e) => tracing::debug!("Fade update not applied: {}", e),
        }
    }

    pub(crate) fn set_positions(&mut self, emitter: Position, listener: Position) -> Result<()> {
        let device = self.devices.active();
        device.emitter = emitter;
        device.listener = listener;
        self.update_fade();
        Ok(())
    }

    pub(crate) fn set_fade_params(&mut self, min: f32, max: f32, pan: f32) -> Result<()> {
        let device = self.devices.active();
        device.fade_override = FadeParams::from_request(min, max, pan);
        match device.fade_override {
            Some(params) => tracing::info!(
                "Fade params set: min={} max={} pan={}",
                params.min_distance,
                params.max_distance,
                params.pan_distance
            ),
            None => tracing::info!("Fade params reset to defaults."),
        }
        self.update_fade();
        Ok(())
    }

    pub(crate) fn volume_up(&mut self, step: f32) -> Result<()> {
        let volume = &mut self.devices.active().volume;
        volume.step_up(step);
        tracing::info!("Volume up: {:.0}%", volume.percent());
        self.update_fade();
        Ok(())
    }

    pub(crate) fn volume_down(&mut self, step: f32) -> Result<()> {
        let volume = &mut self.devices.active().volume;
        volume.step_down(step);
        tracing::info!("Volume down: {:.0}%", volume.percent());
        self.update_fade();
        Ok(())
    }

    pub(crate) fn set_volume(&mut self, percent: f32) -> Result<()> {
        let applied = self.devices.active().volume.set_percent(percent);
        tracing::info!("Volume set: {:.0}%", applied);
        self.update_fade();
        Ok(())
    }

    // Tracks

    pub(crate) fn set_track(&mut self, basename: &str) -> Result<()> {
        let channel = self.selected_channel()?;
        if channel.is_stream() {
            return Err(PlaybackError::StreamHasNoTracks);
        }
        if basename.trim().is_empty() {
            return Err(PlaybackError::EmptyTrackName);
        }
        let index = channel
            .find_song(basename)
            .ok_or_else(|| PlaybackError::TrackNotFound(basename.trim().to_string()))?;

        let was_playing = self.devices.active().state == PlaybackState::Playing;
        if self.devices.active().state.is_active() {
            self.live.close();
            self.devices.active().state = PlaybackState::Stopped;
        }

        let track = channel.songs[index].clone();
        let device = self.devices.active();
        device.cursor.song_index = index;
        device.cursor.previous_was_song = true;
        device.mode = channel.channel_type.playback_mode();
        device.current_track = Some(track.clone());
        tracing::info!("setTrack selected: {} (index={})", file_name(&track), index);

        if was_playing {
            self.play_path(&track)
        } else {
            Ok(())
        }
    }

    // Effects

    pub(crate) fn play_fx(&mut self, name: &str) -> Result<()> {
        let mut path = self.catalog.fx(name).cloned();
        if path.is_none() && self.config.auto_rescan_on_change_playlist {
            if let Err(e) = self.rescan() {
                tracing::warn!("Rescan before FX lookup failed: {}", e);
            }
            path = self.catalog.fx(name).cloned();
        }
        let path = path.ok_or_else(|| PlaybackError::FxNotFound(name.trim().to_string()))?;

        self.stop_fx_handle();
        let mut handle = self.provider.open_fx(&path)?;
        if let Err(e) = handle.play() {
            let _ = handle.close();
            return Err(e);
        }
        self.fx = Some(handle);
        tracing::info!("Playing FX: {}", path.display());
        Ok(())
    }

    pub(crate) fn stop_fx(&mut self) -> Result<()> {
        self.stop_fx_handle();
        Ok(())
    }

    fn stop_fx_handle(&mut self) {
        if let Some(mut handle) = self.fx.take() {
            let _ = handle.stop();
            if let Err(e) = handle.close() {
                tracing::debug!("FX handle close failed: {}", e);
            }
        }
    }

    /// Release everything on worker exit
    pub(crate) fn shutdown_playback(&mut self) {
        self.live.reset();
        self.stop_fx_handle();
        let device = self.devices.active();
        device.state = PlaybackState::Stopped;
        device.mode = PlaybackMode::None;
        device.current_track = None;
        self.provider.shutdown();
    }

    // Read-only accessors

    pub(crate) fn channel_count(&self) -> usize {
        self.catalog.len()
    }

    pub(crate) fn is_playing(&self, id: DeviceId) -> bool {
        self.devices
            .get(id)
            .is_some_and(|device| device.state == PlaybackState::Playing)
    }

    pub(crate) fn volume_percent(&self, id: DeviceId) -> f32 {
        self.devices
            .get(id)
            .map_or(DEFAULT_VOLUME_PERCENT, |device| device.volume.percent())
    }

    pub(crate) fn current_channel(&self, id: DeviceId) -> String {
        self.devices
            .get(id)
            .and_then(|device| device.selected_key.clone())
            .unwrap_or_default()
    }

    pub(crate) fn current_source_name(&self, id: DeviceId) -> String {
        self.devices
            .get(id)
            .and_then(|device| self.channel_of(device))
            .map(|channel| channel.display_name.clone())
            .unwrap_or_default()
    }

    pub(crate) fn current_track_basename(&self, id: DeviceId) -> String {
        self.devices
            .get(id)
            .filter(|device| device.state.is_active())
            .and_then(|device| device.current_track.as_deref())
            .map(file_name)
            .unwrap_or_default()
    }

    /// Track name as hosts display it; `"na"` for streams
    pub(crate) fn track(&self, id: DeviceId) -> String {
        let Some(device) = self.devices.get(id) else {
            return String::new();
        };
        let Some(channel) = self.channel_of(device) else {
            return String::new();
        };
        if channel.is_stream() {
            return "na".to_string();
        }
        if let Some(track) = &device.current_track {
            return file_name(track);
        }
        channel
            .songs
            .get(device.cursor.song_index)
            .map(|song| file_name(song))
            .unwrap_or_default()
    }

    pub(crate) fn last_error(&self, id: DeviceId) -> Option<String> {
        self.devices.get(id).and_then(|device| device.last_error.clone())
    }

    pub(crate) fn status(&self, id: DeviceId) -> DeviceStatus {
        let default = DeviceState::default();
        let device = self.devices.get(id).unwrap_or(&default);
        DeviceStatus {
            device: id.get(),
            channel_key: self.current_channel(id),
            source_name: self.current_source_name(id),
            state: device.state,
            mode: device.mode,
            track: self.track(id),
            volume_percent: device.volume.percent(),
            last_error: device.last_error.clone(),
        }
    }

    fn channel_of(&self, device: &DeviceState) -> Option<&Arc<ChannelEntry>> {
        device.selected_key.as_deref().and_then(|key| self.catalog.get(key))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
