//! Channel catalog built from the library folders and configured streams

use radio_core::{ChannelType, RadioConfig, SourceCategory};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Audio file extensions picked up by a scan
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];

/// One playable source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    /// `playlist/<name>`, `station/<name>` or `stream/<name>`, lowercase
    pub key: String,

    /// Folder or configured name as written
    pub display_name: String,

    pub channel_type: ChannelType,

    /// Set for configured network streams, which have no local files
    pub stream_url: Option<String>,

    /// Sorted song paths
    pub songs: Vec<PathBuf>,

    /// Sorted transition paths (stations only)
    pub transitions: Vec<PathBuf>,

    /// Sorted ad paths (stations only)
    pub ads: Vec<PathBuf>,
}

impl ChannelEntry {
    /// Whether this entry is rendered by the stream chain
    pub fn is_stream(&self) -> bool {
        self.stream_url.is_some()
    }

    /// Source kind as used in logs
    pub fn source_kind(&self) -> &'static str {
        match (self.is_stream(), self.channel_type) {
            (true, _) => "stream",
            (false, ChannelType::Station) => "station",
            (false, ChannelType::Playlist) => "playlist",
        }
    }

    /// Index of the song whose file name or stem matches, case-insensitively
    pub fn find_song(&self, basename: &str) -> Option<usize> {
        let needle = basename.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.songs.iter().position(|song| {
            lowercase_file_name(song).as_deref() == Some(needle.as_str())
                || lowercase_stem(song).as_deref() == Some(needle.as_str())
        })
    }
}

/// Immutable snapshot of every channel and FX file
///
/// Rebuilt wholesale by [`Catalog::scan`]; the engine swaps the whole value.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    channels: HashMap<String, Arc<ChannelEntry>>,

    /// Stream keys in configuration order
    stream_order: Vec<String>,

    /// Lowercase file name and stem -> FX path
    fx_files: HashMap<String, PathBuf>,
}

impl Catalog {
    /// Build a catalog from the configured root and stream stations
    ///
    /// Missing folders are logged and skipped. Channel folders without any
    /// song are not listed.
    pub fn scan(config: &RadioConfig) -> Self {
        let mut catalog = Self::default();
        let root = &config.root_path;

        if root.as_os_str().is_empty() || !root.exists() {
            tracing::warn!("Radio root path does not exist: {}", root.display());
        } else {
            catalog.scan_category(&config.playlists_dir(), ChannelType::Playlist, config);
            catalog.scan_category(&config.stations_dir(), ChannelType::Station, config);
        }

        catalog.add_streams(config);
        catalog.scan_fx(&config.fx_dir());

        catalog
    }

    fn scan_category(&mut self, category_root: &Path, channel_type: ChannelType, config: &RadioConfig) {
        if !category_root.is_dir() {
            tracing::warn!(
                "Category root path does not exist or is not a directory: {}",
                category_root.display()
            );
            return;
        }

        let key_prefix = match channel_type {
            ChannelType::Playlist => "playlist",
            ChannelType::Station => "station",
        };
        let transition_prefix = config.transition_prefix.to_lowercase();
        let ad_prefix = config.ad_prefix.to_lowercase();

        for source in immediate_children(category_root).filter(|path| path.is_dir()) {
            let Some(name) = source.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let mut songs = Vec::new();
            let mut transitions = Vec::new();
            let mut ads = Vec::new();

            for file in immediate_children(&source).filter(|path| path.is_file() && is_audio_file(path)) {
                if channel_type == ChannelType::Playlist {
                    songs.push(file);
                    continue;
                }

                let stem = lowercase_stem(&file).unwrap_or_default();
                if !transition_prefix.is_empty() && stem.starts_with(&transition_prefix) {
                    transitions.push(file);
                } else if !ad_prefix.is_empty() && stem.starts_with(&ad_prefix) {
                    ads.push(file);
                } else {
                    songs.push(file);
                }
            }

            if songs.is_empty() {
                tracing::debug!("Skipping channel without songs: {}", source.display());
                continue;
            }

            songs.sort();
            transitions.sort();
            ads.sort();

            let key = format!("{}/{}", key_prefix, name.to_lowercase());
            self.channels.insert(
                key.clone(),
                Arc::new(ChannelEntry {
                    key,
                    display_name: name,
                    channel_type,
                    stream_url: None,
                    songs,
                    transitions,
                    ads,
                }),
            );
        }
    }

    fn add_streams(&mut self, config: &RadioConfig) {
        for station in &config.stream_stations {
            let name = station.name.trim();
            let url = station.url.trim();
            if name.is_empty() || url.is_empty() {
                continue;
            }

            let key = format!("stream/{}", name.to_lowercase());
            if !self.stream_order.contains(&key) {
                self.stream_order.push(key.clone());
            }
            self.channels.insert(
                key.clone(),
                Arc::new(ChannelEntry {
                    key,
                    display_name: station.name.clone(),
                    channel_type: ChannelType::Station,
                    stream_url: Some(url.to_string()),
                    songs: Vec::new(),
                    transitions: Vec::new(),
                    ads: Vec::new(),
                }),
            );
        }
    }

    fn scan_fx(&mut self, fx_root: &Path) {
        if !fx_root.is_dir() {
            return;
        }

        for file in immediate_children(fx_root).filter(|path| path.is_file() && is_audio_file(path)) {
            for name in [lowercase_file_name(&file), lowercase_stem(&file)].into_iter().flatten() {
                if !name.is_empty() {
                    self.fx_files.entry(name).or_insert_with(|| file.clone());
                }
            }
        }
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel by exact key
    pub fn get(&self, key: &str) -> Option<&Arc<ChannelEntry>> {
        self.channels.get(key)
    }

    /// Stream keys in configuration order
    pub fn stream_order(&self) -> &[String] {
        &self.stream_order
    }

    /// Resolve a caller-supplied channel name
    ///
    /// Tried in order: an exact key (`Playlists/x` and `Stations/x` are
    /// accepted as aliases), a bare name matching exactly one category, and
    /// finally a case-insensitive display name match.
    pub fn lookup(&self, name: &str) -> Option<Arc<ChannelEntry>> {
        let mut key = name.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }

        if let Some(rest) = key.strip_prefix("playlists/") {
            key = format!("playlist/{rest}");
        } else if let Some(rest) = key.strip_prefix("stations/") {
            key = format!("station/{rest}");
        }

        if let Some(entry) = self.channels.get(&key) {
            return Some(Arc::clone(entry));
        }

        let mut prefixed = ["playlist", "station", "stream"]
            .iter()
            .filter_map(|prefix| self.channels.get(&format!("{prefix}/{key}")));
        match (prefixed.next(), prefixed.next()) {
            (Some(entry), None) => return Some(Arc::clone(entry)),
            (Some(_), Some(_)) => return None,
            _ => {}
        }

        self.channels
            .values()
            .find(|entry| entry.display_name.to_lowercase() == key)
            .cloned()
    }

    /// Channels that next-source cycling walks for a category
    ///
    /// Local categories are ordered by lowercase display name; streams keep
    /// their configuration order.
    pub fn sources(&self, category: SourceCategory) -> Vec<Arc<ChannelEntry>> {
        match category {
            SourceCategory::Playlists | SourceCategory::Stations => {
                let wanted = if category == SourceCategory::Playlists {
                    ChannelType::Playlist
                } else {
                    ChannelType::Station
                };
                let mut sources: Vec<_> = self
                    .channels
                    .values()
                    .filter(|entry| !entry.is_stream() && entry.channel_type == wanted)
                    .cloned()
                    .collect();
                sources.sort_by_cached_key(|entry| (entry.display_name.to_lowercase(), entry.key.clone()));
                sources
            }
            SourceCategory::Streams => self
                .stream_order
                .iter()
                .filter_map(|key| self.channels.get(key))
                .filter(|entry| entry.is_stream())
                .cloned()
                .collect(),
        }
    }

    /// FX file by lowercase file name or stem
    pub fn fx(&self, basename: &str) -> Option<&PathBuf> {
        let key = basename.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.fx_files.get(&key)
    }
}

/// Check if a file is a supported audio file
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn immediate_children(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                tracing::warn!("Failed to read library entry: {}", e);
                None
            }
        })
}

fn lowercase_file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_lowercase)
}

fn lowercase_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|n| n.to_str()).map(str::to_lowercase)
}
