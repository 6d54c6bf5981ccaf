//! Desktop backend tests
//!
//! Decoding is tested everywhere. Tests that open an output stream accept a
//! missing audio device (expected in CI) and only check what they can.

use radio_audio_desktop::{DesktopProvider, TrackDecoder, DEFAULT_CONNECT_TIMEOUT};
use radio_core::Interrupt;
use radio_playback::{BackendProvider, HandleStatus, LevelCommand, PlaybackError};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ===== Helpers =====

/// Write a mono 16-bit sine WAV
fn write_wav(path: &Path, sample_rate: u32, frames: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
        writer.write_sample((sample * 16000.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn wav_fixture(sample_rate: u32, frames: usize) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, sample_rate, frames);
    (dir, path)
}

fn provider() -> DesktopProvider {
    DesktopProvider::new(DEFAULT_CONNECT_TIMEOUT).unwrap()
}

// ===== Decoder =====

#[test]
fn test_mono_wav_decodes_to_stereo() {
    let (_dir, path) = wav_fixture(44100, 4410);

    let mut decoder = TrackDecoder::open_file(&path).unwrap();
    assert_eq!(decoder.source_rate(), Some(44100));

    let samples = decoder.decode_all().unwrap();
    assert_eq!(samples.len(), 4410 * 2);
    for frame in samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
    assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!(decoder.next_samples().unwrap().is_none());
}

#[test]
fn test_decoder_resamples_to_output_rate() {
    let (_dir, path) = wav_fixture(22050, 22050);

    let mut decoder = TrackDecoder::open_file(&path).unwrap();
    decoder.set_output_rate(44100);
    let frames = decoder.decode_all().unwrap().len() / 2;

    let expected = 44100.0;
    let error = (frames as f64 - expected).abs() / expected;
    assert!(error < 0.05, "expected about {} frames, got {}", expected, frames);
}

#[test]
fn test_garbage_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.mp3");
    std::fs::write(&path, b"definitely not audio").unwrap();

    assert!(TrackDecoder::open_file(&path).is_err());
}

// ===== Provider =====

#[test]
fn test_command_open_of_missing_file_fails() {
    let mut provider = provider();
    let result = provider.open_command(Path::new("/nonexistent/radio/a.mp3"));

    assert!(matches!(result, Err(PlaybackError::Backend(_))));
    assert!(!provider.command_slot_busy());
}

#[test]
fn test_command_handle_holds_slot_until_closed() {
    let (_dir, path) = wav_fixture(44100, 441);
    let mut provider = provider();

    let mut handle = provider.open_command(&path).unwrap();
    assert!(provider.command_slot_busy());
    assert_eq!(handle.status(), HandleStatus::Stopped);

    handle.close().unwrap();
    assert!(handle.is_closed());
    assert!(!provider.command_slot_busy());
}

#[test]
fn test_fx_and_player_files_do_not_hold_slot() {
    let (_dir, path) = wav_fixture(44100, 441);
    let mut provider = provider();

    let _fx = provider.open_fx(&path).unwrap();
    let _player = provider
        .open_player(&path.to_string_lossy(), &Interrupt::new())
        .unwrap();
    assert!(!provider.command_slot_busy());
}

#[test]
fn test_graph_rejects_file_paths() {
    let (_dir, path) = wav_fixture(44100, 441);
    let mut provider = provider();

    let result = provider.open_graph(&path.to_string_lossy(), &Interrupt::new());
    assert!(matches!(result, Err(PlaybackError::Backend(_))));
}

#[test]
fn test_interrupted_opens_fail_fast() {
    let mut provider = provider();
    let interrupt = Interrupt::new();
    interrupt.request();

    assert!(matches!(
        provider.open_player("http://radio.example/live", &interrupt),
        Err(PlaybackError::Interrupted)
    ));
    assert!(matches!(
        provider.open_graph("http://radio.example/live", &interrupt),
        Err(PlaybackError::Interrupted)
    ));
}

#[test]
fn test_player_url_connects_lazily() {
    let mut provider = provider();

    // Nothing is listening here; opening must still succeed
    let mut handle = provider
        .open_player("http://127.0.0.1:9/live.mp3", &Interrupt::new())
        .unwrap();
    assert_eq!(handle.status(), HandleStatus::Stopped);
    handle.close().unwrap();
}

// ===== Output (device dependent) =====

#[test]
fn test_file_plays_to_end_when_device_available() {
    let (_dir, path) = wav_fixture(44100, 4410);
    let mut provider = provider();
    let mut handle = provider.open_command(&path).unwrap();
    handle.set_level(LevelCommand::Channels { left: 300, right: 700 }).unwrap();

    match handle.play() {
        Ok(()) => {
            let deadline = Instant::now() + Duration::from_secs(5);
            let mut status = handle.status();
            while Instant::now() < deadline && !matches!(status, HandleStatus::Ended | HandleStatus::Failed(_)) {
                thread::sleep(Duration::from_millis(20));
                status = handle.status();
            }

            match status {
                HandleStatus::Ended => {
                    let position = handle.position().unwrap();
                    assert!(position >= Duration::from_millis(90), "position {:?}", position);
                }
                other => println!("Output did not drain (may be expected in CI): {:?}", other),
            }
        }
        Err(e) => println!("No audio device available - skipping ({})", e),
    }

    handle.close().unwrap();
    assert!(!provider.command_slot_busy());
}

#[test]
fn test_pause_and_restart_when_device_available() {
    let (_dir, path) = wav_fixture(44100, 44100);
    let mut provider = provider();
    let mut handle = provider.open_command(&path).unwrap();

    if let Err(e) = handle.play() {
        println!("No audio device available - skipping ({})", e);
        return;
    }

    handle.pause().unwrap();
    let status = handle.status();
    assert!(matches!(status, HandleStatus::Paused | HandleStatus::Failed(_)), "{:?}", status);

    // Restart keeps the pause
    handle.seek_to_start().unwrap();
    let status = handle.status();
    assert!(matches!(status, HandleStatus::Paused | HandleStatus::Failed(_)), "{:?}", status);

    handle.resume().unwrap();
    assert_ne!(handle.status(), HandleStatus::Paused);

    handle.stop().unwrap();
    assert_eq!(handle.status(), HandleStatus::Stopped);
    handle.close().unwrap();
}
