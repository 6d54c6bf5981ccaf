//! Shared fixtures: a recording backend provider and a fake library tree

use crossbeam_channel::{Receiver, Sender};
use radio_core::{EngineSettings, Interrupt, RadioConfig, StreamStation};
use radio_playback::{BackendProvider, HandleStatus, LevelCommand, MediaHandle, RadioEngine};
use radio_resolver::ResolveUrl;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ===== Recording provider =====

/// What the fake backends saw, plus knobs that change their behaviour
#[derive(Default)]
pub struct FakeState {
    pub command_opens: Vec<PathBuf>,
    pub player_opens: Vec<String>,
    pub graph_opens: Vec<String>,
    pub fx_opens: Vec<PathBuf>,
    pub levels: Vec<LevelCommand>,
    pub closes: usize,

    pub fail_command_open: bool,
    pub fail_player_open: bool,
    pub fail_graph_open: bool,
    pub reject_channel_levels: bool,
    pub panic_on_open: bool,

    /// Every handle reports `Ended`
    pub finished: bool,

    /// Position reported by command handles
    pub position: Option<Duration>,

    /// `open_command` blocks until the sender side is dropped
    pub hang: Option<Receiver<()>>,

    /// `open_player` takes this long unless interrupted first
    pub slow_player: Option<Duration>,

    /// Signalled when a slow `open_player` starts waiting
    pub player_entered: Option<Sender<()>>,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeProvider {
    state: Shared,
}

impl FakeProvider {
    pub fn new(state: Shared) -> Self {
        Self { state }
    }

    fn handle(&self) -> Box<dyn MediaHandle> {
        Box::new(FakeHandle {
            state: Arc::clone(&self.state),
            status: HandleStatus::Opening,
            closed: false,
        })
    }
}

impl BackendProvider for FakeProvider {
    fn open_command(&mut self, path: &Path) -> radio_playback::Result<Box<dyn MediaHandle>> {
        let hang = self.state.lock().unwrap().hang.clone();
        if let Some(release) = hang {
            let _ = release.recv();
        }

        let panic_on_open = self.state.lock().unwrap().panic_on_open;
        if panic_on_open {
            panic!("backend exploded opening {}", path.display());
        }

        let mut state = self.state.lock().unwrap();
        state.command_opens.push(path.to_path_buf());
        if state.fail_command_open {
            return Err(radio_playback::PlaybackError::Backend("device busy".to_string()));
        }
        drop(state);
        Ok(self.handle())
    }

    fn open_player(
        &mut self,
        location: &str,
        interrupt: &Interrupt,
    ) -> radio_playback::Result<Box<dyn MediaHandle>> {
        let (slow, entered) = {
            let state = self.state.lock().unwrap();
            (state.slow_player, state.player_entered.clone())
        };
        if let Some(delay) = slow {
            if let Some(entered) = entered {
                let _ = entered.send(());
            }
            let deadline = Instant::now() + delay;
            while Instant::now() < deadline {
                if interrupt.is_requested() {
                    return Err(radio_playback::PlaybackError::Interrupted);
                }
                std::thread::sleep(Duration::from_millis(2));
            }
        }

        let mut state = self.state.lock().unwrap();
        state.player_opens.push(location.to_string());
        if state.fail_player_open {
            return Err(radio_playback::PlaybackError::Backend("no decoder".to_string()));
        }
        drop(state);
        Ok(self.handle())
    }

    fn open_graph(&mut self, url: &str, _interrupt: &Interrupt) -> radio_playback::Result<Box<dyn MediaHandle>> {
        let mut state = self.state.lock().unwrap();
        state.graph_opens.push(url.to_string());
        if state.fail_graph_open {
            return Err(radio_playback::PlaybackError::Backend("render failed".to_string()));
        }
        drop(state);
        Ok(self.handle())
    }

    fn open_fx(&mut self, path: &Path) -> radio_playback::Result<Box<dyn MediaHandle>> {
        self.state.lock().unwrap().fx_opens.push(path.to_path_buf());
        Ok(self.handle())
    }
}

struct FakeHandle {
    state: Shared,
    status: HandleStatus,
    closed: bool,
}

impl MediaHandle for FakeHandle {
    fn play(&mut self) -> radio_playback::Result<()> {
        self.status = HandleStatus::Playing;
        Ok(())
    }

    fn pause(&mut self) -> radio_playback::Result<()> {
        self.status = HandleStatus::Paused;
        Ok(())
    }

    fn stop(&mut self) -> radio_playback::Result<()> {
        self.status = HandleStatus::Stopped;
        Ok(())
    }

    fn close(&mut self) -> radio_playback::Result<()> {
        self.state.lock().unwrap().closes += 1;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn status(&mut self) -> HandleStatus {
        if self.state.lock().unwrap().finished {
            HandleStatus::Ended
        } else {
            self.status.clone()
        }
    }

    fn position(&mut self) -> Option<Duration> {
        self.state.lock().unwrap().position
    }

    fn seek_to_start(&mut self) -> radio_playback::Result<()> {
        self.state.lock().unwrap().position = Some(Duration::ZERO);
        Ok(())
    }

    fn set_level(&mut self, level: LevelCommand) -> radio_playback::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.reject_channel_levels && matches!(level, LevelCommand::Channels { .. }) {
            return Err(radio_playback::PlaybackError::Backend("no pan controls".to_string()));
        }
        state.levels.push(level);
        Ok(())
    }
}

/// Resolver answering from a fixed table
#[derive(Default)]
pub struct TableResolver {
    pub table: HashMap<String, String>,
}

impl ResolveUrl for TableResolver {
    fn resolve(&self, url: &str, _interrupt: &Interrupt) -> String {
        let url = url.trim();
        self.table.get(url).cloned().unwrap_or_else(|| url.to_string())
    }
}

// ===== Library fixture =====

pub const ZETA_URL: &str = "http://zeta.example/live";
pub const ALPHA_URL: &str = "http://alpha.example/listen.pls";
pub const ALPHA_RESOLVED: &str = "http://cdn.example/alpha.mp3";

/// Build a library:
///
/// - Playlists/Rock: a, b, c
/// - Playlists/Jazz: x, y
/// - Stations/Morning: song1, song2, transition_1, ad_1
/// - FX/click.wav
pub fn library() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    for (folder, files) in [
        ("Playlists/Rock", &["c.mp3", "a.mp3", "b.mp3", "notes.txt"][..]),
        ("Playlists/Jazz", &["y.ogg", "x.mp3"][..]),
        ("Stations/Morning", &["song2.mp3", "ad_1.mp3", "song1.mp3", "Transition_1.mp3"][..]),
        ("FX", &["click.wav"][..]),
    ] {
        fs::create_dir_all(root.join(folder)).unwrap();
        for file in files {
            fs::write(root.join(folder).join(file), b"audio").unwrap();
        }
    }

    dir
}

pub fn config(root: &Path) -> RadioConfig {
    RadioConfig {
        root_path: root.to_path_buf(),
        log_fade_changes: false,
        stream_stations: vec![
            StreamStation::new("Zeta FM", ZETA_URL),
            StreamStation::new("Alpha FM", ALPHA_URL),
        ],
        engine: EngineSettings {
            command_timeout_ms: 300,
            tick_interval_ms: 10,
            local_grace_ms: 0,
            stream_grace_ms: 0,
            stream_start_timeout_ms: 200,
            stream_start_poll_ms: 5,
        },
        ..RadioConfig::default()
    }
}

pub fn engine_with(config: RadioConfig, state: &Shared) -> RadioEngine {
    let mut resolver = TableResolver::default();
    resolver
        .table
        .insert(ALPHA_URL.to_string(), ALPHA_RESOLVED.to_string());

    let engine = RadioEngine::new(
        config,
        Box::new(FakeProvider::new(Arc::clone(state))),
        Arc::new(resolver),
    );
    assert!(engine.rescan_library());
    engine
}

pub fn engine(dir: &TempDir, state: &Shared) -> RadioEngine {
    engine_with(config(dir.path()), state)
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
