/// CPAL output thread rendering a shared sample queue
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Samples the decoder may queue ahead of the output (about 4 s at 48 kHz)
pub const QUEUE_CAPACITY: usize = 48_000 * 2 * 4;

/// How long `open` waits for the output thread to report the device config
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-channel output gain, readable from the audio callback without locking
#[derive(Debug)]
pub struct Gains {
    left: AtomicU32,
    right: AtomicU32,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            left: AtomicU32::new(1.0f32.to_bits()),
            right: AtomicU32::new(1.0f32.to_bits()),
        }
    }
}

impl Gains {
    /// Set both gains, clamped to `0.0..=1.0`
    pub fn set(&self, left: f32, right: f32) {
        self.left.store(left.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        self.right.store(right.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Current `(left, right)` gains
    pub fn get(&self) -> (f32, f32) {
        (
            f32::from_bits(self.left.load(Ordering::Relaxed)),
            f32::from_bits(self.right.load(Ordering::Relaxed)),
        )
    }
}

/// Queue between a decode thread and the audio callback
///
/// Samples are interleaved stereo at the device rate.
pub struct PlaybackBuffer {
    samples: Mutex<VecDeque<f32>>,
    gains: Arc<Gains>,
    paused: AtomicBool,
    started: AtomicBool,
    finished: AtomicBool,
    cancel: Arc<AtomicBool>,
    frames_played: AtomicU64,
    error: Mutex<Option<String>>,
}

impl PlaybackBuffer {
    pub fn new(gains: Arc<Gains>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
            gains,
            paused: AtomicBool::new(false),
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            cancel,
            frames_played: AtomicU64::new(0),
            error: Mutex::new(None),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append decoded samples
    pub fn push(&self, samples: &[f32]) {
        self.queue().extend(samples.iter().copied());
        self.started.store(true, Ordering::Release);
    }

    /// Samples waiting to be rendered
    pub fn queued(&self) -> usize {
        self.queue().len()
    }

    /// Whether any audio has been decoded yet
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// The decoder reached the end of the media
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    /// All decoded audio has been rendered and nothing more is coming
    pub fn is_drained(&self) -> bool {
        self.finished.load(Ordering::Acquire) && self.queue().is_empty()
    }

    /// Record an asynchronous failure
    pub fn fail(&self, reason: String) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
    }

    pub fn error(&self) -> Option<String> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stop the decoder and silence the output
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Frames rendered since the session started
    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Relaxed)
    }

    /// Fill one device buffer of `channels` interleaved channels
    ///
    /// Underruns and pauses render silence. Mono devices get the average of
    /// both sides; channels past the second stay silent.
    pub fn fill(&self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        if self.is_paused() || self.is_cancelled() {
            output.fill(0.0);
            return;
        }

        let (left_gain, right_gain) = self.gains.get();
        let mut queue = self.queue();
        let mut rendered = 0u64;

        for frame in output.chunks_mut(channels) {
            frame.fill(0.0);
            if queue.len() < 2 {
                continue;
            }
            let left = queue.pop_front().unwrap_or(0.0) * left_gain;
            let right = queue.pop_front().unwrap_or(0.0) * right_gain;
            rendered += 1;

            if channels == 1 {
                frame[0] = (left + right) * 0.5;
            } else {
                frame[0] = left;
                frame[1] = right;
            }
        }

        drop(queue);
        self.frames_played.fetch_add(rendered, Ordering::Relaxed);
    }
}

/// Commands sent to the output thread
enum OutputCommand {
    Pause,
    Resume,
    Shutdown,
}

/// Output stream on the default device
///
/// A dedicated thread owns the CPAL `Stream`, which is not `Send` on every
/// platform; this handle talks to it over a channel.
pub struct CpalOutput {
    command_tx: Sender<OutputCommand>,
    sample_rate: u32,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Start rendering `buffer` on the default output device
    ///
    /// Blocks until the stream is playing or has failed to open.
    pub fn open(buffer: Arc<PlaybackBuffer>) -> Result<Self> {
        let (command_tx, command_rx) = bounded::<OutputCommand>(32);
        let (ready_tx, ready_rx) = bounded::<Result<u32>>(1);

        let thread = thread::Builder::new()
            .name("radio-output".to_string())
            .spawn(move || Self::run(buffer, command_rx, ready_tx))?;

        let sample_rate = ready_rx
            .recv_timeout(OPEN_TIMEOUT)
            .map_err(|_| AudioError::DeviceError("output thread did not start".to_string()))??;

        Ok(Self {
            command_tx,
            sample_rate,
            thread: Some(thread),
        })
    }

    /// Device sample rate the buffer must be filled at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn pause(&self) {
        let _ = self.command_tx.send(OutputCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.command_tx.send(OutputCommand::Resume);
    }

    /// Output thread main loop
    fn run(buffer: Arc<PlaybackBuffer>, command_rx: Receiver<OutputCommand>, ready_tx: Sender<Result<u32>>) {
        let stream = match Self::build_stream(Arc::clone(&buffer)) {
            Ok((stream, sample_rate)) => {
                let _ = ready_tx.send(Ok(sample_rate));
                stream
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        while let Ok(command) = command_rx.recv() {
            match command {
                OutputCommand::Pause => {
                    if let Err(e) = stream.pause() {
                        tracing::debug!("Output stream pause unsupported: {}", e);
                    }
                }
                OutputCommand::Resume => {
                    if let Err(e) = stream.play() {
                        tracing::warn!("Output stream resume failed: {}", e);
                        buffer.fail(e.to_string());
                    }
                }
                OutputCommand::Shutdown => break,
            }
        }

        drop(stream);
    }

    fn build_stream(buffer: Arc<PlaybackBuffer>) -> Result<(Stream, u32)> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::DeviceNotFound)?;

        let supported = device.default_output_config()?;
        let sample_rate = supported.sample_rate();
        let config = supported.config();
        let channels = usize::from(config.channels);

        let errors = Arc::clone(&buffer);
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| buffer.fill(data, channels),
            move |err| {
                tracing::error!("Audio stream error: {}", err);
                errors.fail(err.to_string());
            },
            None,
        )?;
        stream.play()?;

        tracing::debug!(sample_rate, channels, "Output stream started");
        Ok((stream, sample_rate))
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
