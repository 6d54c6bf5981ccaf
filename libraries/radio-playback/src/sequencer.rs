//! Track sequencing: playlist looping and station interleaving
//!
//! Pure functions over a [`ChannelEntry`] and a device's [`Cursor`]; no I/O.

use crate::catalog::ChannelEntry;
use radio_core::{ChannelType, PlaybackMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-device position within a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub song_index: usize,
    pub transition_index: usize,
    pub ad_index: usize,

    /// Songs emitted since the last ad
    pub songs_since_ad: usize,

    /// Whether the last emission was a song (stations only)
    pub previous_was_song: bool,
}

impl Cursor {
    /// Back to the first song with no ad credit
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Zero the indices but keep `previous_was_song`
    pub fn rewind_indices(&mut self) {
        self.song_index = 0;
        self.transition_index = 0;
        self.ad_index = 0;
        self.songs_since_ad = 0;
    }
}

/// Sequencing knobs taken from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerSettings {
    /// Loop playlists after the last song
    pub loop_playlist: bool,

    /// Songs between ads; 0 disables ads
    pub ad_interval: usize,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            loop_playlist: true,
            ad_interval: 3,
        }
    }
}

fn advances_like_playlist(channel: &ChannelEntry, mode: PlaybackMode) -> bool {
    mode == PlaybackMode::Playlist || channel.channel_type == ChannelType::Playlist
}

/// The track the cursor currently points at, without moving it
///
/// An out-of-range index wraps to the first song, except for a
/// non-looping playlist, which is exhausted.
pub fn current_track(
    channel: &ChannelEntry,
    cursor: &Cursor,
    mode: PlaybackMode,
    settings: &SequencerSettings,
) -> Option<PathBuf> {
    let first = channel.songs.first()?;
    match channel.songs.get(cursor.song_index) {
        Some(song) => Some(song.clone()),
        None if advances_like_playlist(channel, mode) && !settings.loop_playlist => None,
        None => Some(first.clone()),
    }
}

/// Move the cursor and return the next track to play
///
/// Playlists step through songs. Stations emit a song, then either a due
/// ad or the next transition, then a song again; an ad or transition is
/// always followed by a song. Returns `None` when a non-looping playlist
/// runs out.
pub fn advance(
    channel: &ChannelEntry,
    cursor: &mut Cursor,
    mode: PlaybackMode,
    settings: &SequencerSettings,
) -> Option<PathBuf> {
    let song_count = channel.songs.len();
    if song_count == 0 {
        return None;
    }

    if advances_like_playlist(channel, mode) {
        cursor.song_index += 1;
        if cursor.song_index >= song_count {
            if !settings.loop_playlist {
                return None;
            }
            cursor.song_index = 0;
        }
        return Some(channel.songs[cursor.song_index].clone());
    }

    if cursor.previous_was_song {
        cursor.songs_since_ad += 1;

        let ad_due = !channel.ads.is_empty()
            && settings.ad_interval > 0
            && cursor.songs_since_ad >= settings.ad_interval;
        if ad_due {
            cursor.songs_since_ad = 0;
            let next = channel.ads[cursor.ad_index % channel.ads.len()].clone();
            cursor.ad_index += 1;
            cursor.previous_was_song = false;
            return Some(next);
        }

        if !channel.transitions.is_empty() {
            let next = channel.transitions[cursor.transition_index % channel.transitions.len()].clone();
            cursor.transition_index += 1;
            cursor.previous_was_song = false;
            return Some(next);
        }
    }

    cursor.song_index = (cursor.song_index + 1) % song_count;
    cursor.previous_was_song = true;
    Some(channel.songs[cursor.song_index].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(prefix: &str, count: usize) -> Vec<PathBuf> {
        (0..count).map(|i| PathBuf::from(format!("{prefix}{i}.mp3"))).collect()
    }

    fn channel(channel_type: ChannelType, songs: usize, transitions: usize, ads: usize) -> ChannelEntry {
        ChannelEntry {
            key: "station/test".to_string(),
            display_name: "Test".to_string(),
            channel_type,
            stream_url: None,
            songs: paths("song", songs),
            transitions: paths("transition_", transitions),
            ads: paths("ad_", ads),
        }
    }

    fn station_cursor() -> Cursor {
        Cursor {
            previous_was_song: true,
            ..Cursor::default()
        }
    }

    #[test]
    fn test_playlist_loops() {
        let channel = channel(ChannelType::Playlist, 3, 0, 0);
        let settings = SequencerSettings::default();
        let mut cursor = Cursor {
            song_index: 2,
            ..Cursor::default()
        };

        let next = advance(&channel, &mut cursor, PlaybackMode::Playlist, &settings);
        assert_eq!(next, Some(PathBuf::from("song0.mp3")));
        assert_eq!(cursor.song_index, 0);
    }

    #[test]
    fn test_playlist_without_loop_is_exhausted() {
        let channel = channel(ChannelType::Playlist, 3, 0, 0);
        let settings = SequencerSettings {
            loop_playlist: false,
            ad_interval: 3,
        };
        let mut cursor = Cursor {
            song_index: 2,
            ..Cursor::default()
        };

        assert_eq!(advance(&channel, &mut cursor, PlaybackMode::Playlist, &settings), None);
        assert_eq!(current_track(&channel, &cursor, PlaybackMode::Playlist, &settings), None);
    }

    #[test]
    fn test_station_interleaves_transitions_and_ads() {
        let channel = channel(ChannelType::Station, 4, 2, 2);
        let settings = SequencerSettings {
            loop_playlist: true,
            ad_interval: 2,
        };
        let mut cursor = station_cursor();

        let emitted: Vec<String> = (0..8)
            .map(|_| {
                advance(&channel, &mut cursor, PlaybackMode::Station, &settings)
                    .unwrap()
                    .display()
                    .to_string()
            })
            .collect();

        assert_eq!(
            emitted,
            vec![
                "transition_0.mp3",
                "song1.mp3",
                "ad_0.mp3",
                "song2.mp3",
                "transition_1.mp3",
                "song3.mp3",
                "ad_1.mp3",
                "song0.mp3",
            ]
        );
    }

    #[test]
    fn test_station_without_extras_cycles_songs() {
        let channel = channel(ChannelType::Station, 2, 0, 0);
        let settings = SequencerSettings {
            loop_playlist: false,
            ad_interval: 3,
        };
        let mut cursor = station_cursor();

        let first = advance(&channel, &mut cursor, PlaybackMode::Station, &settings);
        let second = advance(&channel, &mut cursor, PlaybackMode::Station, &settings);
        assert_eq!(first, Some(PathBuf::from("song1.mp3")));
        assert_eq!(second, Some(PathBuf::from("song0.mp3")));
    }

    #[test]
    fn test_after_non_song_always_a_song() {
        let channel = channel(ChannelType::Station, 3, 1, 1);
        let settings = SequencerSettings::default();
        let mut cursor = Cursor {
            previous_was_song: false,
            ..Cursor::default()
        };

        let next = advance(&channel, &mut cursor, PlaybackMode::Station, &settings).unwrap();
        assert_eq!(next, PathBuf::from("song1.mp3"));
        assert!(cursor.previous_was_song);
    }

    #[test]
    fn test_current_track_wraps_for_station() {
        let channel = channel(ChannelType::Station, 2, 0, 0);
        let settings = SequencerSettings {
            loop_playlist: false,
            ad_interval: 3,
        };
        let cursor = Cursor {
            song_index: 9,
            ..Cursor::default()
        };

        assert_eq!(
            current_track(&channel, &cursor, PlaybackMode::Station, &settings),
            Some(PathBuf::from("song0.mp3"))
        );
    }

    #[test]
    fn test_empty_channel() {
        let channel = channel(ChannelType::Playlist, 0, 0, 0);
        let settings = SequencerSettings::default();
        let mut cursor = Cursor::default();

        assert_eq!(current_track(&channel, &cursor, PlaybackMode::Playlist, &settings), None);
        assert_eq!(advance(&channel, &mut cursor, PlaybackMode::Playlist, &settings), None);
    }
}
