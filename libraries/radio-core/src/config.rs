//! Radio engine configuration
//!
//! The engine consumes a read-only `RadioConfig`. Hosts load it from a TOML
//! file layered under `RADIO_*` environment overrides, or build it in code.

use crate::error::{RadioError, Result};
use crate::types::{FadeParams, MINIMUM_FADE_GAP};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "radio.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RadioConfig {
    /// Folder holding `Playlists/`, `Stations/` and `FX/`
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Log filter directive used by hosts that honour it (e.g. "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// Station files whose stem starts with this are transitions
    #[serde(default = "default_transition_prefix")]
    pub transition_prefix: String,

    /// Station files whose stem starts with this are ads
    #[serde(default = "default_ad_prefix")]
    pub ad_prefix: String,

    /// Songs between two ads
    #[serde(default = "default_ad_interval_songs")]
    pub ad_interval_songs: usize,

    #[serde(default = "default_min_fade_distance")]
    pub min_fade_distance: f32,

    #[serde(default = "default_max_fade_distance")]
    pub max_fade_distance: f32,

    #[serde(default = "default_true")]
    pub enable_spatial_pan: bool,

    #[serde(default = "default_pan_distance")]
    pub pan_distance: f32,

    /// Log every applied fade level change
    #[serde(default = "default_true")]
    pub log_fade_changes: bool,

    /// Rescan the library before channel selection and FX lookups
    #[serde(default = "default_true")]
    pub auto_rescan_on_change_playlist: bool,

    /// Loop playlists after their last song
    #[serde(default = "default_true")]
    pub loop_playlist: bool,

    /// Log every stream connection attempt at info level
    #[serde(default)]
    pub verbose_stream_diagnostics: bool,

    /// Network stream stations, in declaration order
    #[serde(default, rename = "stream_station")]
    pub stream_stations: Vec<StreamStation>,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,
}

/// A configured network stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "StreamStationEntry")]
pub struct StreamStation {
    pub name: String,
    pub url: String,
}

impl StreamStation {
    /// Create a stream station
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Parse the legacy `Name|Url` form
    pub fn parse_line(line: &str) -> Result<Self> {
        let (name, url) = line
            .split_once('|')
            .ok_or_else(|| RadioError::InvalidStreamStation(format!("expected Name|Url: {line}")))?;
        Self::checked(name, url)
    }

    fn checked(name: &str, url: &str) -> Result<Self> {
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() || url.is_empty() {
            return Err(RadioError::InvalidStreamStation(format!(
                "empty name/url: {name}|{url}"
            )));
        }
        Ok(Self::new(name, url))
    }
}

/// Accepted shapes of a `stream_station` entry
#[derive(Deserialize)]
#[serde(untagged)]
enum StreamStationEntry {
    Table { name: String, url: String },
    Line(String),
}

impl TryFrom<StreamStationEntry> for StreamStation {
    type Error = RadioError;

    fn try_from(entry: StreamStationEntry) -> Result<Self> {
        match entry {
            StreamStationEntry::Table { name, url } => Self::checked(&name, &url),
            StreamStationEntry::Line(line) => Self::parse_line(&line),
        }
    }
}

/// Worker and completion-detection timings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// How long a caller waits for its queued command
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Worker maintenance period
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Completion probes are ignored this long after a local start
    #[serde(default = "default_local_grace_ms")]
    pub local_grace_ms: u64,

    /// Completion probes are ignored this long after a stream start
    #[serde(default = "default_stream_grace_ms")]
    pub stream_grace_ms: u64,

    /// How long a stream backend may take to reach the playing state
    #[serde(default = "default_stream_start_timeout_ms")]
    pub stream_start_timeout_ms: u64,

    /// Poll period while waiting for a stream to start
    #[serde(default = "default_stream_start_poll_ms")]
    pub stream_start_poll_ms: u64,
}

impl EngineSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn local_grace(&self) -> Duration {
        Duration::from_millis(self.local_grace_ms)
    }

    pub fn stream_grace(&self) -> Duration {
        Duration::from_millis(self.stream_grace_ms)
    }

    pub fn stream_start_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_start_timeout_ms)
    }

    pub fn stream_start_poll(&self) -> Duration {
        Duration::from_millis(self.stream_start_poll_ms.max(1))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            local_grace_ms: default_local_grace_ms(),
            stream_grace_ms: default_stream_grace_ms(),
            stream_start_timeout_ms: default_stream_start_timeout_ms(),
            stream_start_poll_ms: default_stream_start_poll_ms(),
        }
    }
}

/// Stream URL resolver limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverSettings {
    /// Connect and read timeout
    #[serde(default = "default_resolver_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum wrapper body size read
    #[serde(default = "default_resolver_max_bytes")]
    pub max_bytes: usize,

    /// Maximum wrapper-in-wrapper depth
    #[serde(default = "default_resolver_max_depth")]
    pub max_depth: u32,
}

impl ResolverSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_resolver_timeout_ms(),
            max_bytes: default_resolver_max_bytes(),
            max_depth: default_resolver_max_depth(),
        }
    }
}

impl RadioConfig {
    /// Load configuration from a TOML file and the environment
    ///
    /// # Arguments
    /// * `path` - Config file; `radio.toml` in the working directory when `None`
    ///
    /// A missing file is not an error: defaults are used and a warning is logged.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

        let mut settings = config::Config::builder();
        if path.exists() {
            settings = settings.add_source(config::File::from(path.clone()));
        } else {
            tracing::warn!("Config not found at {}. Using defaults.", path.display());
        }

        // Override with environment variables (RADIO_ROOT_PATH, RADIO_ENGINE__TICK_INTERVAL_MS, ...)
        settings = settings.add_source(
            config::Environment::with_prefix("RADIO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: RadioConfig = settings.build()?.try_deserialize()?;
        config.normalize();

        tracing::info!(
            "Config loaded. root_path={}, spatial_pan={}, pan_distance={}",
            config.root_path.display(),
            config.enable_spatial_pan,
            config.pan_distance
        );
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: RadioConfig = toml::from_str(text)?;
        config.normalize();
        Ok(config)
    }

    /// Enforce the invariants the engine relies on
    ///
    /// - `ad_interval_songs >= 1`
    /// - `max_fade_distance >= min_fade_distance + 1`
    /// - `pan_distance >= 1`
    pub fn normalize(&mut self) {
        self.ad_interval_songs = self.ad_interval_songs.max(1);
        if self.max_fade_distance < self.min_fade_distance + MINIMUM_FADE_GAP {
            self.max_fade_distance = self.min_fade_distance + MINIMUM_FADE_GAP;
        }
        if self.pan_distance < MINIMUM_FADE_GAP {
            self.pan_distance = MINIMUM_FADE_GAP;
        }
    }

    /// Global fade parameters
    pub fn fade_params(&self) -> FadeParams {
        FadeParams {
            min_distance: self.min_fade_distance,
            max_distance: self.max_fade_distance,
            pan_distance: self.pan_distance,
        }
    }

    pub fn playlists_dir(&self) -> PathBuf {
        self.root_path.join("Playlists")
    }

    pub fn stations_dir(&self) -> PathBuf {
        self.root_path.join("Stations")
    }

    pub fn fx_dir(&self) -> PathBuf {
        self.root_path.join("FX")
    }
}

// Default values
fn default_root_path() -> PathBuf {
    PathBuf::from("Data").join("Radio")
}

fn default_transition_prefix() -> String {
    "transition_".to_string()
}

fn default_ad_prefix() -> String {
    "ad_".to_string()
}

fn default_ad_interval_songs() -> usize {
    3
}

fn default_min_fade_distance() -> f32 {
    150.0
}

fn default_max_fade_distance() -> f32 {
    5000.0
}

fn default_pan_distance() -> f32 {
    1200.0
}

fn default_true() -> bool {
    true
}

fn default_command_timeout_ms() -> u64 {
    5000
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_local_grace_ms() -> u64 {
    800
}

fn default_stream_grace_ms() -> u64 {
    2500
}

fn default_stream_start_timeout_ms() -> u64 {
    10_000
}

fn default_stream_start_poll_ms() -> u64 {
    50
}

fn default_resolver_timeout_ms() -> u64 {
    3500
}

fn default_resolver_max_bytes() -> usize {
    512 * 1024
}

fn default_resolver_max_depth() -> u32 {
    4
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            log_level: None,
            transition_prefix: default_transition_prefix(),
            ad_prefix: default_ad_prefix(),
            ad_interval_songs: default_ad_interval_songs(),
            min_fade_distance: default_min_fade_distance(),
            max_fade_distance: default_max_fade_distance(),
            enable_spatial_pan: true,
            pan_distance: default_pan_distance(),
            log_fade_changes: true,
            auto_rescan_on_change_playlist: true,
            loop_playlist: true,
            verbose_stream_diagnostics: false,
            stream_stations: Vec::new(),
            engine: EngineSettings::default(),
            resolver: ResolverSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = RadioConfig::default();
        assert_eq!(config.root_path, PathBuf::from("Data").join("Radio"));
        assert_eq!(config.transition_prefix, "transition_");
        assert_eq!(config.ad_prefix, "ad_");
        assert_eq!(config.ad_interval_songs, 3);
        assert_eq!(config.min_fade_distance, 150.0);
        assert_eq!(config.max_fade_distance, 5000.0);
        assert_eq!(config.pan_distance, 1200.0);
        assert!(config.enable_spatial_pan);
        assert!(config.loop_playlist);
        assert!(!config.verbose_stream_diagnostics);
        assert_eq!(config.engine.command_timeout_ms, 5000);
        assert_eq!(config.engine.tick_interval_ms, 100);
        assert_eq!(config.resolver.max_bytes, 524288);
        assert_eq!(config.resolver.max_depth, 4);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = RadioConfig::from_toml_str("").unwrap();
        assert_eq!(config.ad_interval_songs, 3);
        assert!(config.stream_stations.is_empty());
    }

    #[test]
    fn stream_stations_keep_declaration_order() {
        let config = RadioConfig::from_toml_str(
            r#"
            stream_station = [
                "Zulu Radio|http://zulu.example/stream",
                { name = "Alpha", url = "http://alpha.example/live.pls" },
                "Mike|https://mike.example/;",
            ]
            "#,
        )
        .unwrap();

        let names: Vec<_> = config.stream_stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Zulu Radio", "Alpha", "Mike"]);
        assert_eq!(config.stream_stations[2].url, "https://mike.example/;");
    }

    #[test]
    fn malformed_stream_station_is_rejected() {
        assert!(RadioConfig::from_toml_str(r#"stream_station = ["no separator"]"#).is_err());
        assert!(RadioConfig::from_toml_str(r#"stream_station = ["  |http://x"]"#).is_err());
    }

    #[test]
    fn normalization_enforces_minimums() {
        let config = RadioConfig::from_toml_str(
            r#"
            ad_interval_songs = 0
            min_fade_distance = 400.0
            max_fade_distance = 100.0
            pan_distance = 0.0
            "#,
        )
        .unwrap();

        assert_eq!(config.ad_interval_songs, 1);
        assert_eq!(config.max_fade_distance, 401.0);
        assert_eq!(config.pan_distance, 1.0);
    }

    #[test]
    fn nested_sections_parse() {
        let config = RadioConfig::from_toml_str(
            r#"
            [engine]
            command_timeout_ms = 250
            tick_interval_ms = 10

            [resolver]
            max_depth = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.command_timeout(), Duration::from_millis(250));
        assert_eq!(config.engine.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.engine.local_grace_ms, 800);
        assert_eq!(config.resolver.max_depth, 2);
        assert_eq!(config.resolver.timeout_ms, 3500);
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("radio.toml");
        fs::write(
            &path,
            r#"
            root_path = "/srv/radio"
            loop_playlist = false
            stream_station = ["Jazz|http://jazz.example/listen.pls"]
            "#,
        )
        .unwrap();

        let config = RadioConfig::load(Some(&path)).unwrap();
        assert_eq!(config.root_path, PathBuf::from("/srv/radio"));
        assert!(!config.loop_playlist);
        assert_eq!(config.stream_stations.len(), 1);
        assert_eq!(config.playlists_dir(), PathBuf::from("/srv/radio/Playlists"));
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = RadioConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.ad_interval_songs, 3);
    }
}
