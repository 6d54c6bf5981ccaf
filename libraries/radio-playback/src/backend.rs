//! Playback backends
//!
//! The engine renders through three kinds of OS-level players: a legacy
//! command interface for local files, a modern stream-capable player and a
//! filter-graph player. A [`BackendProvider`] opens handles for each kind;
//! the engine owns at most one open handle at a time, tagged by kind in
//! [`Backend`].

use crate::error::{PlaybackError, Result};
use crate::fade::{attenuation_centibels, FadeLevels};
use radio_core::{EngineSettings, Interrupt};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Close attempts made on a command handle
const CLOSE_ATTEMPTS: usize = 3;

/// How long each close attempt waits for the handle to report closed
const CLOSE_WAIT: Duration = Duration::from_millis(80);

/// Pause between close attempts
const CLOSE_RETRY_DELAY: Duration = Duration::from_millis(20);

const CLOSE_POLL: Duration = Duration::from_millis(10);

/// Status a handle reports when polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleStatus {
    /// Opening, buffering or seeking
    Opening,
    Playing,
    Paused,
    Stopped,

    /// Reached the end of the media
    Ended,

    /// Asynchronous error reported by the player
    Failed(String),
}

/// Level command in the unit a backend understands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelCommand {
    /// Master level, `0..=1000`
    Master(u32),

    /// Per-channel levels, `0..=1000`
    Channels { left: u32, right: u32 },

    /// Linear volume, `0.0..=1.0`
    Linear(f32),

    /// Attenuation in hundredths of a dB, `-10000..=0`
    Attenuation(i32),
}

/// An open player
pub trait MediaHandle: Send {
    /// Start or restart rendering
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Continue after a pause
    fn resume(&mut self) -> Result<()> {
        self.play()
    }

    /// Stop rendering but keep the handle open
    fn stop(&mut self) -> Result<()>;

    /// Release the handle
    fn close(&mut self) -> Result<()>;

    /// Whether the handle has been released
    fn is_closed(&self) -> bool;

    /// Poll the player
    fn status(&mut self) -> HandleStatus;

    /// Playback position, when the player can report it
    fn position(&mut self) -> Option<Duration> {
        None
    }

    /// Jump back to the start of the media
    fn seek_to_start(&mut self) -> Result<()> {
        Err(PlaybackError::Backend("seek not supported".to_string()))
    }

    /// Apply an output level
    fn set_level(&mut self, level: LevelCommand) -> Result<()>;
}

/// Factory for backend handles
///
/// Opening a handle must not start playback; the engine calls
/// [`MediaHandle::play`] itself.
pub trait BackendProvider: Send {
    /// Legacy command interface; local files only
    fn open_command(&mut self, path: &Path) -> Result<Box<dyn MediaHandle>>;

    /// Modern player; accepts URLs and local paths
    fn open_player(&mut self, location: &str, interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>>;

    /// Filter-graph player for URLs
    fn open_graph(&mut self, url: &str, interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>>;

    /// One-shot effect player, independent of the main handle
    fn open_fx(&mut self, path: &Path) -> Result<Box<dyn MediaHandle>> {
        self.open_command(path)
    }

    /// Whether a previous command handle is still holding the device
    fn command_slot_busy(&self) -> bool {
        false
    }

    /// Release global resources
    fn shutdown(&mut self) {}
}

/// Kind tag of the open backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    None,
    LegacyCommand,
    ModernPlayer,
    FilterGraph,
}

/// Levels last sent to the backend, for redundancy suppression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedLevels {
    pub volume: u32,
    pub left: u32,
    pub right: u32,
}

/// Whether the legacy backend may be asked for per-channel levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanSupport {
    pub available: bool,
    pub unavailable_logged: bool,
}

impl Default for PanSupport {
    fn default() -> Self {
        Self {
            available: true,
            unavailable_logged: false,
        }
    }
}

/// The open backend, if any
#[derive(Default)]
pub enum Backend {
    #[default]
    None,
    LegacyCommand(Box<dyn MediaHandle>),
    ModernPlayer(Box<dyn MediaHandle>),
    FilterGraph(Box<dyn MediaHandle>),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Backend::{:?}", self.kind())
    }
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::None => BackendKind::None,
            Backend::LegacyCommand(_) => BackendKind::LegacyCommand,
            Backend::ModernPlayer(_) => BackendKind::ModernPlayer,
            Backend::FilterGraph(_) => BackendKind::FilterGraph,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Backend::None)
    }

    fn handle(&mut self) -> Result<&mut Box<dyn MediaHandle>> {
        match self {
            Backend::None => Err(PlaybackError::BackendUnavailable),
            Backend::LegacyCommand(handle)
            | Backend::ModernPlayer(handle)
            | Backend::FilterGraph(handle) => Ok(handle),
        }
    }

    /// Completion probes within this window after a start are ignored
    pub fn grace_period(&self, settings: &EngineSettings) -> Duration {
        match self {
            Backend::ModernPlayer(_) | Backend::FilterGraph(_) => settings.stream_grace(),
            Backend::LegacyCommand(_) | Backend::None => settings.local_grace(),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        self.handle()?.pause()
    }

    /// Resume; the command interface falls back to a fresh play
    pub fn resume(&mut self) -> Result<()> {
        match self {
            Backend::LegacyCommand(handle) => handle.resume().or_else(|_| handle.play()),
            _ => self.handle()?.resume(),
        }
    }

    /// Restart the current file if it has played past `threshold`
    ///
    /// Only the command interface reports positions. Returns `true` when the
    /// handle was rewound.
    pub fn restart_if_past(&mut self, threshold: Duration, keep_paused: bool) -> bool {
        let Backend::LegacyCommand(handle) = self else {
            return false;
        };
        if !handle.position().is_some_and(|position| position > threshold) {
            return false;
        }
        if handle.seek_to_start().is_err() {
            return false;
        }
        if !keep_paused {
            if let Err(e) = handle.play() {
                tracing::warn!("Replay after rewind failed: {}", e);
            }
        }
        true
    }

    /// Whether the open media has finished or failed
    pub fn is_complete(&mut self) -> bool {
        match self {
            Backend::None => {
                tracing::warn!("No playback handle while state=Playing. Treating track as complete.");
                true
            }
            Backend::LegacyCommand(handle) => {
                !matches!(
                    handle.status(),
                    HandleStatus::Playing | HandleStatus::Paused | HandleStatus::Opening
                )
            }
            Backend::ModernPlayer(handle) => match handle.status() {
                HandleStatus::Playing | HandleStatus::Paused => false,
                HandleStatus::Failed(reason) => {
                    tracing::warn!("Stream player error while playing: {}", reason);
                    true
                }
                HandleStatus::Ended => {
                    tracing::warn!("Stream player playback ended.");
                    true
                }
                HandleStatus::Opening | HandleStatus::Stopped => true,
            },
            Backend::FilterGraph(handle) => match handle.status() {
                HandleStatus::Playing | HandleStatus::Paused | HandleStatus::Opening => false,
                HandleStatus::Failed(reason) => {
                    tracing::warn!("Filter graph stream event indicates error: {}", reason);
                    true
                }
                HandleStatus::Ended | HandleStatus::Stopped => true,
            },
        }
    }

    /// The level triple this backend would end up with for `levels`
    ///
    /// Only the command interface with pan controls available keeps
    /// distinct left/right levels; every other path collapses to scalar.
    pub fn effective_levels(&self, levels: &FadeLevels, pan: PanSupport, spatial_pan: bool) -> AppliedLevels {
        let per_channel = matches!(self, Backend::LegacyCommand(_)) && spatial_pan && pan.available;
        if per_channel {
            AppliedLevels {
                volume: levels.volume,
                left: levels.left,
                right: levels.right,
            }
        } else {
            AppliedLevels {
                volume: levels.volume,
                left: levels.volume,
                right: levels.volume,
            }
        }
    }

    /// Send `levels` in the backend's own unit
    ///
    /// Returns what was actually applied. A failed per-channel write on the
    /// command interface disables pan for the rest of the session and
    /// retries with a master level.
    pub fn apply_levels(
        &mut self,
        levels: &FadeLevels,
        pan: &mut PanSupport,
        spatial_pan: bool,
    ) -> Result<AppliedLevels> {
        let scalar = AppliedLevels {
            volume: levels.volume,
            left: levels.volume,
            right: levels.volume,
        };

        match self {
            Backend::None => Err(PlaybackError::BackendUnavailable),
            Backend::ModernPlayer(handle) => {
                handle.set_level(LevelCommand::Linear(levels.scalar as f32))?;
                Ok(scalar)
            }
            Backend::FilterGraph(handle) => {
                handle.set_level(LevelCommand::Attenuation(attenuation_centibels(levels.scalar)))?;
                Ok(scalar)
            }
            Backend::LegacyCommand(handle) => {
                if spatial_pan && pan.available {
                    let channels = LevelCommand::Channels {
                        left: levels.left,
                        right: levels.right,
                    };
                    match handle.set_level(channels) {
                        Ok(()) => {
                            return Ok(AppliedLevels {
                                volume: levels.volume,
                                left: levels.left,
                                right: levels.right,
                            })
                        }
                        Err(e) => {
                            pan.available = false;
                            if !pan.unavailable_logged {
                                pan.unavailable_logged = true;
                                tracing::warn!(
                                    "Stereo pan controls unavailable on this playback device ({}). Falling back to scalar volume fade.",
                                    e
                                );
                            }
                        }
                    }
                }
                handle.set_level(LevelCommand::Master(levels.volume))?;
                Ok(scalar)
            }
        }
    }

    /// Stop and release the handle, leaving `Backend::None`
    ///
    /// Command handles get several close attempts; one that never reports
    /// closed is logged and dropped.
    pub fn close(&mut self) {
        match std::mem::take(self) {
            Backend::None => {}
            Backend::LegacyCommand(mut handle) => close_with_retries(handle.as_mut()),
            Backend::ModernPlayer(mut handle) | Backend::FilterGraph(mut handle) => {
                let _ = handle.stop();
                if let Err(e) = handle.close() {
                    tracing::debug!("Stream handle close failed: {}", e);
                }
            }
        }
    }
}

fn close_with_retries(handle: &mut dyn MediaHandle) {
    let _ = handle.stop();

    for _ in 0..CLOSE_ATTEMPTS {
        let closed = match handle.close() {
            Ok(()) => wait_until(CLOSE_WAIT, || handle.is_closed()),
            Err(_) => handle.is_closed(),
        };
        if closed {
            return;
        }

        let _ = handle.stop();
        thread::sleep(CLOSE_RETRY_DELAY);
    }

    tracing::warn!("Playback handle did not close cleanly after retries.");
}

/// Poll `condition` until it holds or `timeout` passes
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(CLOSE_POLL);
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        levels: Vec<LevelCommand>,
        closes: usize,
    }

    struct FakeHandle {
        log: Arc<Mutex<Log>>,
        status: HandleStatus,
        reject_channels: bool,
        closes_needed: usize,
        closed: bool,
        position: Option<Duration>,
    }

    impl FakeHandle {
        fn new(log: Arc<Mutex<Log>>) -> Self {
            Self {
                log,
                status: HandleStatus::Playing,
                reject_channels: false,
                closes_needed: 1,
                closed: false,
                position: None,
            }
        }
    }

    impl MediaHandle for FakeHandle {
        fn play(&mut self) -> Result<()> {
            self.status = HandleStatus::Playing;
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            self.status = HandleStatus::Paused;
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.status = HandleStatus::Stopped;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            let mut log = self.log.lock().unwrap();
            log.closes += 1;
            self.closed = log.closes >= self.closes_needed;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        fn status(&mut self) -> HandleStatus {
            self.status.clone()
        }

        fn position(&mut self) -> Option<Duration> {
            self.position
        }

        fn seek_to_start(&mut self) -> Result<()> {
            self.position = Some(Duration::ZERO);
            Ok(())
        }

        fn set_level(&mut self, level: LevelCommand) -> Result<()> {
            if self.reject_channels && matches!(level, LevelCommand::Channels { .. }) {
                return Err(PlaybackError::Backend("no pan".to_string()));
            }
            self.log.lock().unwrap().levels.push(level);
            Ok(())
        }
    }

    fn levels() -> FadeLevels {
        FadeLevels {
            distance: 0.0,
            scalar: 0.5,
            volume: 500,
            left: 200,
            right: 450,
            pan: 0.5,
        }
    }

    #[test]
    fn legacy_applies_channels() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut backend = Backend::LegacyCommand(Box::new(FakeHandle::new(Arc::clone(&log))));
        let mut pan = PanSupport::default();

        let applied = backend.apply_levels(&levels(), &mut pan, true).unwrap();
        assert_eq!(applied, AppliedLevels { volume: 500, left: 200, right: 450 });
        assert_eq!(
            log.lock().unwrap().levels,
            vec![LevelCommand::Channels { left: 200, right: 450 }]
        );
    }

    #[test]
    fn legacy_falls_back_to_master_once() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut handle = FakeHandle::new(Arc::clone(&log));
        handle.reject_channels = true;
        let mut backend = Backend::LegacyCommand(Box::new(handle));
        let mut pan = PanSupport::default();

        let applied = backend.apply_levels(&levels(), &mut pan, true).unwrap();
        assert_eq!(applied, AppliedLevels { volume: 500, left: 500, right: 500 });
        assert!(!pan.available);
        assert!(pan.unavailable_logged);

        backend.apply_levels(&levels(), &mut pan, true).unwrap();
        assert_eq!(
            log.lock().unwrap().levels,
            vec![LevelCommand::Master(500), LevelCommand::Master(500)]
        );
    }

    #[test]
    fn stream_backends_use_their_units() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut player = Backend::ModernPlayer(Box::new(FakeHandle::new(Arc::clone(&log))));
        let mut graph = Backend::FilterGraph(Box::new(FakeHandle::new(Arc::clone(&log))));
        let mut pan = PanSupport::default();

        player.apply_levels(&levels(), &mut pan, true).unwrap();
        graph.apply_levels(&levels(), &mut pan, true).unwrap();

        let recorded = log.lock().unwrap().levels.clone();
        assert_eq!(recorded[0], LevelCommand::Linear(0.5));
        assert_eq!(recorded[1], LevelCommand::Attenuation(-602));
    }

    #[test]
    fn effective_levels_collapse_without_pan() {
        let log = Arc::new(Mutex::new(Log::default()));
        let backend = Backend::ModernPlayer(Box::new(FakeHandle::new(log)));
        let applied = backend.effective_levels(&levels(), PanSupport::default(), true);
        assert_eq!(applied.left, 500);
        assert_eq!(applied.right, 500);
    }

    #[test]
    fn completion_per_kind() {
        let log = Arc::new(Mutex::new(Log::default()));

        let mut opening = FakeHandle::new(Arc::clone(&log));
        opening.status = HandleStatus::Opening;
        assert!(!Backend::LegacyCommand(Box::new(opening)).is_complete());

        let mut opening = FakeHandle::new(Arc::clone(&log));
        opening.status = HandleStatus::Opening;
        assert!(Backend::ModernPlayer(Box::new(opening)).is_complete());

        let mut ended = FakeHandle::new(Arc::clone(&log));
        ended.status = HandleStatus::Ended;
        assert!(Backend::FilterGraph(Box::new(ended)).is_complete());

        assert!(Backend::None.is_complete());
    }

    #[test]
    fn close_retries_until_closed() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut handle = FakeHandle::new(Arc::clone(&log));
        handle.closes_needed = 2;
        let mut backend = Backend::LegacyCommand(Box::new(handle));

        backend.close();
        assert!(!backend.is_open());
        assert_eq!(log.lock().unwrap().closes, 2);
    }

    #[test]
    fn close_gives_up_after_three_attempts() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut handle = FakeHandle::new(Arc::clone(&log));
        handle.closes_needed = 10;
        let mut backend = Backend::LegacyCommand(Box::new(handle));

        backend.close();
        assert_eq!(log.lock().unwrap().closes, 3);
    }

    #[test]
    fn restart_only_past_threshold() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut handle = FakeHandle::new(Arc::clone(&log));
        handle.position = Some(Duration::from_millis(1000));
        let mut backend = Backend::LegacyCommand(Box::new(handle));
        assert!(!backend.restart_if_past(Duration::from_millis(3000), false));

        let mut handle = FakeHandle::new(log);
        handle.position = Some(Duration::from_millis(4000));
        let mut backend = Backend::LegacyCommand(Box::new(handle));
        assert!(backend.restart_if_past(Duration::from_millis(3000), false));
    }
}
