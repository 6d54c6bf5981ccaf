//! Backend fallback chains
//!
//! Local files go to the command backend first and fall back to the modern
//! player. Streams are resolved, expanded into URL candidates and tried on
//! the modern player, then on the filter graph, one candidate at a time.

use crate::backend::{wait_until, Backend, BackendProvider, HandleStatus, MediaHandle};
use crate::error::{PlaybackError, Result};
use radio_core::{EngineSettings, Interrupt};
use radio_resolver::{stream_candidates, ResolveUrl};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// How long a new local open waits for the previous command handle to go away
pub const COMMAND_SLOT_WAIT: Duration = Duration::from_millis(150);

/// A stream that is up and playing
#[derive(Debug)]
pub struct StreamStart {
    pub backend: Backend,

    /// Candidate URL that played
    pub url: String,
}

/// Open and start a local file
///
/// The caller must have closed the previous backend already.
pub fn start_local(
    provider: &mut dyn BackendProvider,
    path: &Path,
    interrupt: &Interrupt,
    settings: &EngineSettings,
) -> Result<Backend> {
    if !wait_until(COMMAND_SLOT_WAIT, || !provider.command_slot_busy()) {
        tracing::warn!("Previous playback handle still open before file play. Attempting reopen anyway.");
    }

    match provider.open_command(path) {
        Ok(mut handle) => {
            if let Err(e) = handle.play() {
                let mut failed = Backend::LegacyCommand(handle);
                failed.close();
                return Err(e);
            }
            tracing::info!("Now playing: {}", path.display());
            Ok(Backend::LegacyCommand(handle))
        }
        Err(e) => {
            tracing::warn!(
                "Command backend local open failed ({}). Trying player fallback for: {}",
                e,
                path.display()
            );

            let location = path.to_string_lossy();
            let handle = provider
                .open_player(&location, interrupt)
                .and_then(|handle| start_player(handle, interrupt, settings, true))
                .map_err(|e| match e {
                    PlaybackError::Interrupted => e,
                    other => {
                        tracing::warn!("Player fallback failed for {}: {}", path.display(), other);
                        PlaybackError::LocalExhausted(path.display().to_string())
                    }
                })?;

            tracing::info!("Now playing (player fallback): {}", path.display());
            Ok(Backend::ModernPlayer(handle))
        }
    }
}

/// Resolve a stream URL and start the first candidate that plays
///
/// # Arguments
/// * `provider` - Backend factory
/// * `resolver` - Wrapper resolution
/// * `url` - Configured stream URL
/// * `interrupt` - Checked between every attempt
/// * `settings` - Start timeout and poll period
/// * `verbose` - Log every failed attempt at info level
pub fn start_stream(
    provider: &mut dyn BackendProvider,
    resolver: &dyn ResolveUrl,
    url: &str,
    interrupt: &Interrupt,
    settings: &EngineSettings,
    verbose: bool,
) -> Result<StreamStart> {
    let direct = url.trim();
    if direct.is_empty() {
        tracing::warn!("Stream play failed: empty URL.");
        return Err(PlaybackError::EmptyStreamUrl);
    }

    check(interrupt)?;
    let resolved = resolver.resolve(direct, interrupt);
    check(interrupt)?;

    for candidate in stream_candidates(direct, &resolved) {
        check(interrupt)?;
        let attempt = provider
            .open_player(&candidate, interrupt)
            .and_then(|handle| start_player(handle, interrupt, settings, verbose));
        match attempt {
            Ok(handle) => {
                log_started(direct, &candidate, "");
                return Ok(StreamStart {
                    backend: Backend::ModernPlayer(handle),
                    url: candidate,
                });
            }
            Err(PlaybackError::Interrupted) => return Err(PlaybackError::Interrupted),
            Err(e) => log_attempt(verbose, "player", &candidate, &e),
        }

        check(interrupt)?;
        let attempt = provider
            .open_graph(&candidate, interrupt)
            .and_then(|mut handle| match handle.play() {
                Ok(()) => Ok(handle),
                Err(e) => {
                    let _ = handle.close();
                    Err(e)
                }
            });
        match attempt {
            Ok(handle) => {
                log_started(direct, &candidate, " (filter graph fallback)");
                return Ok(StreamStart {
                    backend: Backend::FilterGraph(handle),
                    url: candidate,
                });
            }
            Err(PlaybackError::Interrupted) => return Err(PlaybackError::Interrupted),
            Err(e) => log_attempt(verbose, "filter graph", &candidate, &e),
        }
    }

    tracing::warn!("Stream play failed after all URL attempts: {}", direct);
    Err(PlaybackError::StreamExhausted(direct.to_string()))
}

/// Play a modern player handle and wait until it reports playing
fn start_player(
    mut handle: Box<dyn MediaHandle>,
    interrupt: &Interrupt,
    settings: &EngineSettings,
    detailed: bool,
) -> Result<Box<dyn MediaHandle>> {
    let outcome = handle
        .play()
        .and_then(|()| wait_until_playing(handle.as_mut(), interrupt, settings));

    match outcome {
        Ok(()) => Ok(handle),
        Err(e) => {
            if detailed && !matches!(e, PlaybackError::Interrupted) {
                tracing::warn!("Player did not reach playing state: {}", e);
            }
            let _ = handle.stop();
            let _ = handle.close();
            Err(e)
        }
    }
}

fn wait_until_playing(
    handle: &mut dyn MediaHandle,
    interrupt: &Interrupt,
    settings: &EngineSettings,
) -> Result<()> {
    let deadline = Instant::now() + settings.stream_start_timeout();

    while Instant::now() < deadline {
        check(interrupt)?;
        match handle.status() {
            HandleStatus::Playing | HandleStatus::Paused => return Ok(()),
            HandleStatus::Failed(reason) => return Err(PlaybackError::Backend(reason)),
            HandleStatus::Ended => {
                return Err(PlaybackError::Backend("player shut down while starting".to_string()))
            }
            HandleStatus::Opening | HandleStatus::Stopped => {}
        }
        thread::sleep(settings.stream_start_poll());
    }

    match handle.status() {
        HandleStatus::Playing | HandleStatus::Paused => Ok(()),
        status => Err(PlaybackError::Backend(format!(
            "timed out waiting for playback, last status {:?}",
            status
        ))),
    }
}

fn check(interrupt: &Interrupt) -> Result<()> {
    if interrupt.is_requested() {
        Err(PlaybackError::Interrupted)
    } else {
        Ok(())
    }
}

fn log_started(direct: &str, candidate: &str, via: &str) {
    if candidate.eq_ignore_ascii_case(direct) {
        tracing::info!("Now streaming{}: {}", via, direct);
    } else {
        tracing::info!("Now streaming{}: {} (resolved: {})", via, direct, candidate);
    }
}

fn log_attempt(verbose: bool, backend: &str, candidate: &str, error: &PlaybackError) {
    if verbose {
        tracing::info!("Stream attempt via {} failed for {}: {}", backend, candidate, error);
    } else {
        tracing::debug!("Stream attempt via {} failed for {}: {}", backend, candidate, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LevelCommand;

    struct Stalled;

    impl MediaHandle for Stalled {
        fn play(&mut self) -> Result<()> {
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            true
        }

        fn status(&mut self) -> HandleStatus {
            HandleStatus::Opening
        }

        fn set_level(&mut self, _level: LevelCommand) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting {
        player: usize,
        graph: usize,
    }

    impl BackendProvider for Counting {
        fn open_command(&mut self, _path: &Path) -> Result<Box<dyn MediaHandle>> {
            Err(PlaybackError::BackendUnavailable)
        }

        fn open_player(&mut self, _location: &str, _interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>> {
            self.player += 1;
            Ok(Box::new(Stalled))
        }

        fn open_graph(&mut self, _url: &str, _interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>> {
            self.graph += 1;
            Ok(Box::new(Stalled))
        }
    }

    struct Echo;

    impl ResolveUrl for Echo {
        fn resolve(&self, url: &str, _interrupt: &Interrupt) -> String {
            url.trim().to_string()
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            stream_start_timeout_ms: 30,
            stream_start_poll_ms: 5,
            ..EngineSettings::default()
        }
    }

    #[test]
    fn test_interrupted_stream_opens_nothing() {
        let mut provider = Counting::default();
        let interrupt = Interrupt::new();
        interrupt.request();

        let result = start_stream(&mut provider, &Echo, "http://s.example/live", &interrupt, &settings(), false);
        assert!(matches!(result, Err(PlaybackError::Interrupted)));
        assert_eq!(provider.player, 0);
        assert_eq!(provider.graph, 0);
    }

    #[test]
    fn test_empty_stream_url() {
        let mut provider = Counting::default();
        let result = start_stream(&mut provider, &Echo, "   ", &Interrupt::new(), &settings(), true);
        assert!(matches!(result, Err(PlaybackError::EmptyStreamUrl)));
    }

    #[test]
    fn test_stalled_player_falls_back_to_graph() {
        let mut provider = Counting::default();
        let started = start_stream(
            &mut provider,
            &Echo,
            "http://s.example/live.mp3",
            &Interrupt::new(),
            &settings(),
            true,
        )
        .unwrap();

        assert_eq!(started.backend.kind(), crate::backend::BackendKind::FilterGraph);
        assert_eq!(started.url, "http://s.example/live.mp3");
        assert_eq!(provider.player, 1);
        assert_eq!(provider.graph, 1);
    }

    #[test]
    fn test_local_without_any_backend_is_exhausted() {
        struct Refusing;

        impl BackendProvider for Refusing {
            fn open_command(&mut self, _path: &Path) -> Result<Box<dyn MediaHandle>> {
                Err(PlaybackError::BackendUnavailable)
            }

            fn open_player(&mut self, _location: &str, _interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>> {
                Err(PlaybackError::BackendUnavailable)
            }

            fn open_graph(&mut self, _url: &str, _interrupt: &Interrupt) -> Result<Box<dyn MediaHandle>> {
                Err(PlaybackError::BackendUnavailable)
            }
        }

        let result = start_local(&mut Refusing, Path::new("a.mp3"), &Interrupt::new(), &settings());
        assert!(matches!(result, Err(PlaybackError::LocalExhausted(_))));
    }
}
