//! Media handles rendered through the desktop output
//!
//! A handle owns at most one playback session: an output stream on the
//! default device plus a decode thread feeding it. Stopping drops the
//! session; playing again starts a fresh one from the beginning.

use crate::decoder::TrackDecoder;
use crate::error::AudioError;
use crate::output::{CpalOutput, Gains, PlaybackBuffer, QUEUE_CAPACITY};
use crate::stream;
use radio_playback::fade::MAX_LEVEL;
use radio_playback::{HandleStatus, LevelCommand, MediaHandle, PlaybackError, Result};
use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Decoder back-off while the output queue is full
const DECODE_BACKOFF: Duration = Duration::from_millis(20);

/// Which provider entry point opened a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Command,
    Player,
    Graph,
    Fx,
}

/// Counts live command handles for the provider's busy check
#[derive(Debug)]
pub(crate) struct SlotGuard(Arc<AtomicUsize>);

impl SlotGuard {
    pub(crate) fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Url(String),
}

/// Where a new session gets its decoder from
enum SessionSource {
    Ready(TrackDecoder),
    File(PathBuf),
    Url { client: Client, url: String },
}

impl SessionSource {
    fn open(self, cancel: &Arc<AtomicBool>) -> crate::Result<TrackDecoder> {
        match self {
            SessionSource::Ready(decoder) => Ok(decoder),
            SessionSource::File(path) => TrackDecoder::open_file(&path),
            SessionSource::Url { client, url } => stream::connect(&client, &url, cancel),
        }
    }
}

/// Decoder probed at open time, handed to the first session
struct Prepared {
    decoder: TrackDecoder,
    cancel: Arc<AtomicBool>,
}

/// One output stream plus its decode thread
struct Session {
    buffer: Arc<PlaybackBuffer>,
    output: CpalOutput,
    sample_rate: u32,
}

impl Session {
    fn start(source: SessionSource, gains: Arc<Gains>, cancel: Arc<AtomicBool>) -> crate::Result<Self> {
        let buffer = Arc::new(PlaybackBuffer::new(gains, Arc::clone(&cancel)));
        let output = match CpalOutput::open(Arc::clone(&buffer)) {
            Ok(output) => output,
            Err(e) => {
                buffer.cancel();
                return Err(e);
            }
        };
        let sample_rate = output.sample_rate();

        let decode_buffer = Arc::clone(&buffer);
        thread::Builder::new()
            .name("radio-decode".to_string())
            .spawn(move || decode_loop(source, decode_buffer, cancel, sample_rate))?;

        Ok(Self {
            buffer,
            output,
            sample_rate,
        })
    }

    fn position(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.buffer.frames_played() as f64 / f64::from(self.sample_rate))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.buffer.cancel();
    }
}

fn decode_loop(source: SessionSource, buffer: Arc<PlaybackBuffer>, cancel: Arc<AtomicBool>, sample_rate: u32) {
    let mut decoder = match source.open(&cancel) {
        Ok(decoder) => decoder,
        Err(e) => {
            if !buffer.is_cancelled() {
                tracing::warn!("Could not open media for playback: {}", e);
                buffer.fail(e.to_string());
            }
            return;
        }
    };
    decoder.set_output_rate(sample_rate);

    while !buffer.is_cancelled() {
        if buffer.queued() >= QUEUE_CAPACITY {
            thread::sleep(DECODE_BACKOFF);
            continue;
        }

        match decoder.next_samples() {
            Ok(Some(samples)) => buffer.push(&samples),
            Ok(None) => {
                buffer.finish();
                return;
            }
            Err(e) => {
                if !buffer.is_cancelled() {
                    tracing::warn!("Decoding stopped: {}", e);
                    buffer.fail(e.to_string());
                }
                return;
            }
        }
    }
}

/// Desktop implementation of [`MediaHandle`]
pub struct DesktopHandle {
    kind: HandleKind,
    location: Location,
    client: Option<Client>,
    prepared: Option<Prepared>,
    session: Option<Session>,
    gains: Arc<Gains>,
    stopped: bool,
    closed: bool,
    slot: Option<SlotGuard>,
}

impl DesktopHandle {
    /// Handle for a local file that has already been probed
    pub(crate) fn file(kind: HandleKind, path: &Path, decoder: TrackDecoder, slot: Option<SlotGuard>) -> Self {
        Self {
            kind,
            location: Location::File(path.to_path_buf()),
            client: None,
            prepared: Some(Prepared {
                decoder,
                cancel: Arc::new(AtomicBool::new(false)),
            }),
            session: None,
            gains: Arc::new(Gains::default()),
            stopped: false,
            closed: false,
            slot,
        }
    }

    /// Handle for a URL that connects when played
    pub(crate) fn stream(kind: HandleKind, url: &str, client: Client) -> Self {
        Self {
            kind,
            location: Location::Url(url.to_string()),
            client: Some(client),
            prepared: None,
            session: None,
            gains: Arc::new(Gains::default()),
            stopped: false,
            closed: false,
            slot: None,
        }
    }

    /// Handle for a URL that is already connected and probed
    pub(crate) fn connected(
        kind: HandleKind,
        url: &str,
        client: Client,
        decoder: TrackDecoder,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let mut handle = Self::stream(kind, url, client);
        handle.prepared = Some(Prepared { decoder, cancel });
        handle
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Current `(left, right)` output gains
    pub fn gains(&self) -> (f32, f32) {
        self.gains.get()
    }

    fn start_session(&mut self) -> Result<()> {
        let (source, cancel) = match self.prepared.take() {
            Some(prepared) => (SessionSource::Ready(prepared.decoder), prepared.cancel),
            None => {
                let source = match (&self.location, &self.client) {
                    (Location::File(path), _) => SessionSource::File(path.clone()),
                    (Location::Url(url), Some(client)) => SessionSource::Url {
                        client: client.clone(),
                        url: url.clone(),
                    },
                    (Location::Url(_), None) => {
                        return Err(AudioError::Unsupported("stream handle without a client").into())
                    }
                };
                (source, Arc::new(AtomicBool::new(false)))
            }
        };

        tracing::debug!(kind = ?self.kind, location = ?self.location, "Starting playback session");
        self.session = Some(Session::start(source, Arc::clone(&self.gains), cancel)?);
        self.stopped = false;
        Ok(())
    }

    fn drop_session(&mut self) {
        self.session = None;
        if let Some(prepared) = self.prepared.take() {
            prepared.cancel.store(true, Ordering::Release);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(PlaybackError::Backend("handle is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl MediaHandle for DesktopHandle {
    fn play(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.session.as_ref().is_some_and(|s| s.buffer.is_drained()) {
            self.session = None;
        }

        if let Some(session) = &self.session {
            if session.buffer.is_paused() {
                session.buffer.set_paused(false);
                session.output.resume();
            }
            return Ok(());
        }
        self.start_session()
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_open()?;
        let session = self.session.as_ref().ok_or(PlaybackError::NotPlaying)?;
        session.buffer.set_paused(true);
        session.output.pause();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.drop_session();
        self.stopped = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.drop_session();
        self.slot = None;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn status(&mut self) -> HandleStatus {
        if self.closed || self.stopped {
            return HandleStatus::Stopped;
        }
        let Some(session) = &self.session else {
            return HandleStatus::Stopped;
        };

        if let Some(reason) = session.buffer.error() {
            HandleStatus::Failed(reason)
        } else if session.buffer.is_drained() {
            HandleStatus::Ended
        } else if session.buffer.is_paused() {
            HandleStatus::Paused
        } else if session.buffer.has_started() {
            HandleStatus::Playing
        } else {
            HandleStatus::Opening
        }
    }

    fn position(&mut self) -> Option<Duration> {
        self.session.as_ref().map(Session::position)
    }

    fn seek_to_start(&mut self) -> Result<()> {
        self.ensure_open()?;
        if matches!(self.location, Location::Url(_)) {
            return Err(AudioError::Unsupported("seek on a live stream").into());
        }

        let was_paused = self.session.as_ref().is_some_and(|s| s.buffer.is_paused());
        self.drop_session();
        self.start_session()?;
        if was_paused {
            self.pause()?;
        }
        Ok(())
    }

    fn set_level(&mut self, level: LevelCommand) -> Result<()> {
        let (left, right) = gains_for(level);
        self.gains.set(left, right);
        Ok(())
    }
}

/// Linear `(left, right)` output gains for a level command
pub fn gains_for(level: LevelCommand) -> (f32, f32) {
    let scale = |level: u32| level.min(MAX_LEVEL) as f32 / MAX_LEVEL as f32;

    match level {
        LevelCommand::Master(level) => (scale(level), scale(level)),
        LevelCommand::Channels { left, right } => (scale(left), scale(right)),
        LevelCommand::Linear(gain) => {
            let gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
            (gain, gain)
        }
        LevelCommand::Attenuation(centibels) => {
            let gain = if centibels <= -10_000 {
                0.0
            } else {
                10f32.powf(centibels.min(0) as f32 / 2000.0)
            };
            (gain, gain)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: (f32, f32), expected: (f32, f32)) -> bool {
        (actual.0 - expected.0).abs() < 1e-3 && (actual.1 - expected.1).abs() < 1e-3
    }

    #[test]
    fn test_gains_for_levels() {
        assert!(approx(gains_for(LevelCommand::Master(500)), (0.5, 0.5)));
        assert!(approx(gains_for(LevelCommand::Master(4000)), (1.0, 1.0)));
        assert!(approx(gains_for(LevelCommand::Channels { left: 250, right: 1000 }), (0.25, 1.0)));
        assert!(approx(gains_for(LevelCommand::Linear(0.3)), (0.3, 0.3)));
        assert!(approx(gains_for(LevelCommand::Linear(f32::NAN)), (0.0, 0.0)));
    }

    #[test]
    fn test_attenuation_gains() {
        assert!(approx(gains_for(LevelCommand::Attenuation(0)), (1.0, 1.0)));
        assert!(approx(gains_for(LevelCommand::Attenuation(-602)), (0.5, 0.5)));
        assert!(approx(gains_for(LevelCommand::Attenuation(-10_000)), (0.0, 0.0)));
        assert!(approx(gains_for(LevelCommand::Attenuation(300)), (1.0, 1.0)));
    }

    #[test]
    fn test_slot_guard_counts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = SlotGuard::acquire(&counter);
        let second = SlotGuard::acquire(&counter);
        assert_eq!(counter.load(Ordering::Acquire), 2);
        drop(first);
        drop(second);
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_unplayed_stream_handle() {
        let client = Client::new();
        let mut handle = DesktopHandle::stream(HandleKind::Player, "http://radio.example/live", client);

        assert_eq!(handle.status(), HandleStatus::Stopped);
        assert_eq!(handle.position(), None);
        assert!(handle.seek_to_start().is_err());
        assert!(matches!(handle.pause(), Err(PlaybackError::NotPlaying)));

        handle.set_level(LevelCommand::Channels { left: 100, right: 900 }).unwrap();
        assert!(approx(handle.gains(), (0.1, 0.9)));

        handle.close().unwrap();
        assert!(handle.is_closed());
        assert!(handle.play().is_err());
    }
}
