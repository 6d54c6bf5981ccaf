//! Public engine API and the command worker
//!
//! Every operation that touches a backend handle runs on one worker thread.
//! Callers send the operation over a channel and block on a per-command
//! response channel, bounded by the configured command timeout. Calls made
//! before the worker starts, or from the worker itself, run inline.

use crate::backend::BackendProvider;
use crate::device::DeviceStatus;
use crate::error::{PlaybackError, Result};
use crate::state::{EngineCore, Job};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use radio_core::{DeviceId, Interrupt, Position, RadioConfig};
use radio_resolver::ResolveUrl;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Completion callback for [`RadioEngine::play_async`]
pub type Completion = Box<dyn FnOnce(bool) + Send>;

/// Who receives a command's result
enum Reply {
    /// A caller blocked in `run`
    Waiting(Sender<bool>),

    /// Run on the worker after the engine lock is released
    Callback(Completion),
}

/// Worker messages
enum Message {
    Run {
        device: Option<DeviceId>,
        name: &'static str,
        job: Job,
        reply: Reply,
    },
    Shutdown,
}

/// State shared with the worker thread
struct Shared {
    core: Mutex<EngineCore>,
    interrupt: Interrupt,
    running: AtomicBool,
    worker_id: Mutex<Option<ThreadId>>,
    command_timeout: Duration,
    tick_interval: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_worker(&self) -> bool {
        let worker = *self.worker_id.lock().unwrap_or_else(PoisonError::into_inner);
        worker == Some(thread::current().id())
    }

    /// Run a job under the lock, containing panics
    fn execute(&self, device: Option<DeviceId>, name: &str, job: Job) -> bool {
        let mut core = self.lock();
        let outcome = catch_unwind(AssertUnwindSafe(|| core.dispatch(device, name, job)));
        match outcome {
            Ok(ok) => ok,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Radio command '{}' panicked: {}", name, message);
                core.record(device, name, Err(PlaybackError::Panicked(message)))
            }
        }
    }

    fn tick(&self) {
        let mut core = self.lock();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| core.tick())) {
            tracing::error!("Radio maintenance tick panicked: {}", panic_message(payload.as_ref()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Multi-device radio engine
///
/// All methods are safe to call from any thread. Mutating operations return
/// `false` on failure; [`RadioEngine::last_error`] holds the reason.
///
/// # Example
///
/// ```ignore
/// use radio_core::{DeviceId, RadioConfig};
/// use radio_playback::RadioEngine;
///
/// let engine = RadioEngine::new(config, provider, resolver);
/// engine.initialize();
///
/// let radio = DeviceId::new(0x14);
/// engine.change_playlist(radio, "Jazz");
/// engine.play(radio);
/// ```
pub struct RadioEngine {
    shared: Arc<Shared>,
    command_tx: Sender<Message>,
    command_rx: Receiver<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RadioEngine {
    /// Create an engine; nothing is scanned or started yet
    ///
    /// # Arguments
    /// * `config` - Normalized engine configuration
    /// * `provider` - Backend factory used on the worker thread
    /// * `resolver` - Stream URL resolution
    pub fn new(
        config: RadioConfig,
        provider: Box<dyn BackendProvider>,
        resolver: Arc<dyn ResolveUrl>,
    ) -> Self {
        let interrupt = Interrupt::new();
        let command_timeout = config.engine.command_timeout();
        let tick_interval = config.engine.tick_interval();
        let core = EngineCore::new(config, provider, resolver, interrupt.clone());

        let (command_tx, command_rx) = unbounded();

        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                interrupt,
                running: AtomicBool::new(false),
                worker_id: Mutex::new(None),
                command_timeout,
                tick_interval,
            }),
            command_tx,
            command_rx,
            worker: Mutex::new(None),
        }
    }

    /// Scan the library and start the worker
    ///
    /// A failed scan is logged; the engine still starts.
    pub fn initialize(&self) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return true;
        }

        if let Err(e) = self.shared.lock().rescan() {
            tracing::warn!("Radio library scan failed during initialize: {}", e);
        }

        let shared = Arc::clone(&self.shared);
        let command_rx = self.command_rx.clone();
        let spawned = thread::Builder::new()
            .name("radio-worker".to_string())
            .spawn(move || worker_loop(shared, command_rx));

        match spawned {
            Ok(handle) => {
                *self.shared.worker_id.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(handle.thread().id());
                self.shared.running.store(true, Ordering::Release);
                *worker = Some(handle);
                tracing::info!("Radio engine initialized.");
                true
            }
            Err(e) => {
                tracing::error!("Failed to start radio worker thread: {}", e);
                false
            }
        }
    }

    /// Stop playback, join the worker and drop queued commands
    pub fn shutdown(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(handle) = handle else {
            self.shared.lock().shutdown_playback();
            return;
        };

        self.shared.interrupt.request();
        if self.command_tx.send(Message::Shutdown).is_err() {
            tracing::warn!("Radio worker queue closed before shutdown.");
        }
        let on_worker = self.shared.on_worker();
        self.shared.running.store(false, Ordering::Release);

        // Dropped from a completion callback: the worker exits on its own
        if on_worker {
            return;
        }
        if handle.join().is_err() {
            tracing::error!("Radio worker thread panicked during shutdown.");
        }

        *self.shared.worker_id.lock().unwrap_or_else(PoisonError::into_inner) = None;
        while self.command_rx.try_recv().is_ok() {}
        self.shared.interrupt.clear();

        tracing::info!("Radio engine shut down.");
    }

    /// Run a command on the worker and wait for its result
    fn run<F>(&self, device: Option<DeviceId>, name: &'static str, job: F) -> bool
    where
        F: FnOnce(&mut EngineCore) -> Result<()> + Send + 'static,
    {
        let job: Job = Box::new(job);
        if !self.shared.running.load(Ordering::Acquire) || self.shared.on_worker() {
            return self.shared.execute(device, name, job);
        }

        let (reply_tx, reply_rx) = bounded(1);
        let message = Message::Run {
            device,
            name,
            job,
            reply: Reply::Waiting(reply_tx),
        };
        if self.command_tx.send(message).is_err() {
            tracing::error!("Radio worker is not accepting commands ({}).", name);
            return false;
        }

        match reply_rx.recv_timeout(self.shared.command_timeout) {
            Ok(ok) => ok,
            Err(RecvTimeoutError::Timeout) => {
                let id = device.map_or(0, DeviceId::get);
                tracing::error!(
                    "Radio command timed out waiting for worker completion (deviceId={}).",
                    id
                );
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("{} failed: {}", name, PlaybackError::WorkerGone);
                false
            }
        }
    }

    /// Request an interrupt of in-flight work, then run
    fn run_interrupting<F>(&self, device: DeviceId, name: &'static str, job: F) -> bool
    where
        F: FnOnce(&mut EngineCore) -> Result<()> + Send + 'static,
    {
        self.shared.interrupt.request();
        self.run(Some(device), name, job)
    }

    // Library and selection

    /// Rebuild the channel catalog; `false` when it comes out empty
    pub fn rescan_library(&self) -> bool {
        self.run(None, "rescan_library", |core| core.rescan())
    }

    /// Select a channel by key, bare name or display name
    pub fn change_playlist(&self, device: DeviceId, name: &str) -> bool {
        let name = name.to_string();
        self.run_interrupting(device, "change_playlist", move |core| core.change_playlist(&name))
    }

    /// Select the first source of a category (1 playlists, 2 stations, 3 streams)
    pub fn change_to_next_source(&self, device: DeviceId, category: i32) -> bool {
        self.run_interrupting(device, "change_to_next_source", move |core| {
            core.select_source(category, false)
        })
    }

    /// Select the source after the current one within a category, wrapping
    pub fn select_next_source(&self, device: DeviceId, category: i32) -> bool {
        self.run_interrupting(device, "select_next_source", move |core| {
            core.select_source(category, true)
        })
    }

    // Transport

    /// Resume if paused, otherwise play from the cursor
    pub fn play(&self, device: DeviceId) -> bool {
        self.run(Some(device), "play", |core| core.play())
    }

    /// Queue `play` without waiting
    ///
    /// `completion` runs on the worker with the result, after the engine
    /// lock is released, so it may call back into the engine.
    pub fn play_async(&self, device: DeviceId, completion: impl FnOnce(bool) + Send + 'static) {
        let job: Job = Box::new(|core: &mut EngineCore| core.play());
        if !self.shared.running.load(Ordering::Acquire) || self.shared.on_worker() {
            let ok = self.shared.execute(Some(device), "play_async", job);
            completion(ok);
            return;
        }

        let message = Message::Run {
            device: Some(device),
            name: "play_async",
            job,
            reply: Reply::Callback(Box::new(completion)),
        };
        if let Err(e) = self.command_tx.send(message) {
            tracing::error!("Radio worker is not accepting commands (play_async).");
            if let Message::Run {
                reply: Reply::Callback(completion),
                ..
            } = e.into_inner()
            {
                completion(false);
            }
        }
    }

    /// Cold start a station from its first song
    pub fn start(&self, device: DeviceId) -> bool {
        self.run(Some(device), "start", |core| core.start())
    }

    pub fn pause(&self, device: DeviceId) -> bool {
        self.run(Some(device), "pause", |core| core.pause())
    }

    /// Stop and rewind to the beginning of the channel
    pub fn stop(&self, device: DeviceId) -> bool {
        self.run_interrupting(device, "stop", |core| core.stop())
    }

    /// Skip to the next song
    pub fn forward(&self, device: DeviceId) -> bool {
        self.run_interrupting(device, "forward", |core| core.forward())
    }

    /// Restart the current song, or step back when near its start
    pub fn rewind(&self, device: DeviceId) -> bool {
        self.run_interrupting(device, "rewind", |core| core.rewind())
    }

    /// Run one maintenance pass on the worker
    ///
    /// The worker does this on its own every tick; hosts that never call
    /// [`RadioEngine::initialize`] can drive it by hand.
    pub fn tick(&self) -> bool {
        self.run(None, "tick", |core| {
            core.tick();
            Ok(())
        })
    }

    // Levels

    /// Update emitter and listener positions and refresh the fade
    pub fn set_positions(&self, device: DeviceId, emitter: Position, listener: Position) -> bool {
        self.run(Some(device), "set_positions", move |core| {
            core.set_positions(emitter, listener)
        })
    }

    /// Override fade radii; any negative value resets all three
    pub fn set_fade_params(&self, device: DeviceId, min: f32, max: f32, pan: f32) -> bool {
        self.run(Some(device), "set_fade_params", move |core| {
            core.set_fade_params(min, max, pan)
        })
    }

    /// Raise volume by `step` percent (5 when `step <= 0`)
    pub fn volume_up(&self, device: DeviceId, step: f32) -> bool {
        self.run(Some(device), "volume_up", move |core| core.volume_up(step))
    }

    /// Lower volume by `step` percent (5 when `step <= 0`)
    pub fn volume_down(&self, device: DeviceId, step: f32) -> bool {
        self.run(Some(device), "volume_down", move |core| core.volume_down(step))
    }

    /// Set volume in percent, clamped to 0-200
    pub fn set_volume(&self, device: DeviceId, percent: f32) -> bool {
        self.run(Some(device), "set_volume", move |core| core.set_volume(percent))
    }

    /// Volume in percent; 100 for a device never seen
    pub fn get_volume(&self, device: DeviceId) -> f32 {
        self.shared.lock().volume_percent(device)
    }

    // Tracks

    /// Track file name; `"na"` for streams, empty when unknown
    pub fn get_track(&self, device: DeviceId) -> String {
        self.shared.lock().track(device)
    }

    /// Jump to a song by file name or stem, case-insensitive
    pub fn set_track(&self, device: DeviceId, basename: &str) -> bool {
        let basename = basename.to_string();
        self.run_interrupting(device, "set_track", move |core| core.set_track(&basename))
    }

    // Effects

    /// Play a one-shot effect from the FX folder
    pub fn play_fx(&self, device: DeviceId, name: &str) -> bool {
        let name = name.to_string();
        self.run(Some(device), "play_fx", move |core| core.play_fx(&name))
    }

    pub fn stop_fx(&self, device: DeviceId) -> bool {
        self.run(Some(device), "stop_fx", |core| core.stop_fx())
    }

    // Read-only accessors

    pub fn is_playing(&self, device: DeviceId) -> bool {
        self.shared.lock().is_playing(device)
    }

    /// Selected channel key, empty when none
    pub fn current_channel(&self, device: DeviceId) -> String {
        self.shared.lock().current_channel(device)
    }

    /// Display name of the selected channel
    pub fn current_source_name(&self, device: DeviceId) -> String {
        self.shared.lock().current_source_name(device)
    }

    /// File name of the open track while playing or paused
    pub fn current_track_basename(&self, device: DeviceId) -> String {
        self.shared.lock().current_track_basename(device)
    }

    pub fn channel_count(&self) -> usize {
        self.shared.lock().channel_count()
    }

    /// Reason the device's last command failed
    pub fn last_error(&self, device: DeviceId) -> Option<String> {
        self.shared.lock().last_error(device)
    }

    /// Snapshot of a device
    pub fn status(&self, device: DeviceId) -> DeviceStatus {
        self.shared.lock().status(device)
    }

    /// Configuration the engine runs with
    pub fn config(&self) -> RadioConfig {
        self.shared.lock().config().clone()
    }
}

impl Drop for RadioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, command_rx: Receiver<Message>) {
    tracing::debug!("Radio worker started.");

    'outer: loop {
        let first = match command_rx.recv_timeout(shared.tick_interval) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        for message in first.into_iter().chain(std::iter::from_fn(|| command_rx.try_recv().ok())) {
            match message {
                Message::Shutdown => break 'outer,
                Message::Run {
                    device,
                    name,
                    job,
                    reply,
                } => {
                    let ok = shared.execute(device, name, job);
                    match reply {
                        Reply::Waiting(reply_tx) => {
                            // The caller may have timed out and gone
                            let _ = reply_tx.send(ok);
                        }
                        Reply::Callback(completion) => {
                            if catch_unwind(AssertUnwindSafe(|| completion(ok))).is_err() {
                                tracing::error!("Radio command completion callback panicked ({}).", name);
                            }
                        }
                    }
                }
            }
        }

        shared.tick();
    }

    shared.lock().shutdown_playback();
    tracing::debug!("Radio worker stopped.");
}
