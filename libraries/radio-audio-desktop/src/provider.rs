//! [`BackendProvider`] for desktop hosts
//!
//! All three backend kinds render through the default cpal output device.
//! They differ in how they open media:
//!
//! - command: local files only, probed at open, counted as holding the
//!   command slot until closed
//! - player: files or URLs; URLs connect in the background after `play`,
//!   so the engine waits for the handle to report playing
//! - graph: URLs only, connected and probed synchronously at open

use crate::decoder::TrackDecoder;
use crate::error::AudioError;
use crate::handle::{DesktopHandle, HandleKind, SlotGuard};
use crate::stream::{self, is_remote};
use radio_core::Interrupt;
use radio_playback::{BackendProvider, MediaHandle, PlaybackError, Result};
use reqwest::blocking::Client;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default connect timeout for stream backends
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Desktop backend factory
pub struct DesktopProvider {
    client: Client,
    command_handles: Arc<AtomicUsize>,
}

impl DesktopProvider {
    /// Create a provider whose stream connections give up after `connect_timeout`
    ///
    /// Must not be called from inside an async runtime.
    pub fn new(connect_timeout: Duration) -> crate::Result<Self> {
        Ok(Self {
            client: stream::stream_client(connect_timeout)?,
            command_handles: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Command handles opened and not yet closed
    pub fn open_command_handles(&self) -> usize {
        self.command_handles.load(Ordering::Acquire)
    }

    fn local(&self, kind: HandleKind, path: &Path) -> Result<Box<dyn MediaHandle>> {
        let decoder = TrackDecoder::open_file(path)?;
        let slot = (kind == HandleKind::Command).then(|| SlotGuard::acquire(&self.command_handles));
        Ok(Box::new(DesktopHandle::file(kind, path, decoder, slot)))
    }
}

impl BackendProvider for DesktopProvider {
    fn open_command(&mut self, path: &Path) -> Result<Box<dyn MediaHandle>> {
        self.local(HandleKind::Command, path)
    }

    fn open_player(&mut self, location: &str, interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>> {
        if interrupt.is_requested() {
            return Err(PlaybackError::Interrupted);
        }

        if is_remote(location) {
            Ok(Box::new(DesktopHandle::stream(
                HandleKind::Player,
                location.trim(),
                self.client.clone(),
            )))
        } else {
            self.local(HandleKind::Player, Path::new(location))
        }
    }

    fn open_graph(&mut self, url: &str, interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>> {
        if !is_remote(url) {
            return Err(AudioError::Unsupported("filter graph renders URLs only").into());
        }
        if interrupt.is_requested() {
            return Err(PlaybackError::Interrupted);
        }

        let url = url.trim();
        let cancel = Arc::new(AtomicBool::new(false));
        let decoder = stream::connect(&self.client, url, &cancel)?;

        if interrupt.is_requested() {
            cancel.store(true, Ordering::Release);
            return Err(PlaybackError::Interrupted);
        }

        Ok(Box::new(DesktopHandle::connected(
            HandleKind::Graph,
            url,
            self.client.clone(),
            decoder,
            cancel,
        )))
    }

    fn open_fx(&mut self, path: &Path) -> Result<Box<dyn MediaHandle>> {
        self.local(HandleKind::Fx, path)
    }

    fn command_slot_busy(&self) -> bool {
        self.open_command_handles() > 0
    }

    fn shutdown(&mut self) {
        let open = self.open_command_handles();
        if open > 0 {
            tracing::debug!("{} command handle(s) still open at shutdown", open);
        }
    }
}
