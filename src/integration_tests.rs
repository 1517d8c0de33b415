//! End-to-end flows across config, CLI parsing, playlist building and the engine

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::audio::tests::mock::{MockBackend, MockTrack};
use crate::audio::tests::{track_end_channel, wait_until};
use crate::audio::PlaybackEngine;
use crate::cli::{CliApp, Commands};
use crate::config::{ConfigManager, EngineConfig};
use crate::models::EngineState;
use crate::queue::{expand_folders, resolve_paths};

const WAIT: Duration = Duration::from_secs(5);

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"dummy audio data").unwrap();
    path
}

/// Write `config` to disk and read it back the way the binary does at startup
fn saved_and_reloaded(temp_dir: &TempDir, config: EngineConfig) -> EngineConfig {
    let config_path = temp_dir.path().join("config").join("config.toml");
    let mut manager = ConfigManager::with_path(config_path.clone()).unwrap();
    manager.update_config(|current| *current = config).unwrap();

    ConfigManager::with_path(config_path).unwrap().get_config().clone()
}

#[test]
fn test_play_folder_command_from_config() {
    let media = TempDir::new().unwrap();
    let first = touch(media.path(), "stories/01.mp3");
    let second = touch(media.path(), "stories/02.mp3");
    let nested = touch(media.path(), "stories/extra/03.mp3");
    touch(media.path(), "stories/cover.jpg");

    let config = saved_and_reloaded(
        &media,
        EngineConfig {
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            block_frames: 100,
            pause_poll_ms: 5,
            default_volume: 0.5,
            repeat_playlist: false,
            media_root: Some(media.path().to_path_buf()),
            ..EngineConfig::default()
        },
    );
    assert_eq!(config.default_volume, 0.5);

    let backend = MockBackend::new()
        .with_track(first.to_str().unwrap(), MockTrack::new(1000, 1, 200, 1000))
        .with_track(second.to_str().unwrap(), MockTrack::new(1000, 1, 200, 2000))
        .with_track(nested.to_str().unwrap(), MockTrack::new(1000, 1, 200, 3000));
    let (callback, finished) = track_end_channel();
    let engine = PlaybackEngine::new(config.clone(), Arc::new(backend.clone()), Some(callback));

    let (paths, recursive) = match CliApp::parse_command("play -r stories").unwrap() {
        Commands::Play { paths, recursive, .. } => (paths, recursive),
        other => panic!("Expected Play command, got {:?}", other),
    };
    let tracks = resolve_paths(config.media_root.as_deref(), &paths);
    let tracks = expand_folders(tracks, recursive).unwrap();
    assert_eq!(tracks.len(), 3);

    engine.load_tracks(tracks);
    engine.play().unwrap();

    assert_eq!(finished.recv_timeout(WAIT).unwrap(), first);
    assert_eq!(finished.recv_timeout(WAIT).unwrap(), second);
    assert_eq!(finished.recv_timeout(WAIT).unwrap(), nested);
    assert!(wait_until(WAIT, || engine.state() == EngineState::Idle));

    let samples = backend.stats().samples;
    assert_eq!(samples.len(), 600);
    assert_eq!(samples[0], 500);
    assert_eq!(samples[250], 1000);
    assert_eq!(samples[599], 1500);
}

#[test]
fn test_volume_persists_across_restarts() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let mut manager = ConfigManager::with_path(config_path.clone()).unwrap();
    let engine = PlaybackEngine::new(
        manager.get_config().clone(),
        Arc::new(MockBackend::new()),
        None,
    );
    match CliApp::parse_command("volume 30").unwrap() {
        Commands::Volume { level } => engine.set_volume(f32::from(level) / 100.0),
        other => panic!("Expected Volume command, got {:?}", other),
    }
    manager.set_volume(engine.get_volume()).unwrap();

    let reloaded = ConfigManager::with_path(config_path).unwrap();
    let engine = PlaybackEngine::new(
        reloaded.get_config().clone(),
        Arc::new(MockBackend::new()),
        None,
    );
    assert!((engine.get_volume() - 0.3).abs() < 1e-6);
}

#[tokio::test]
async fn test_blocking_controls_from_async_runtime() {
    let backend = MockBackend::new()
        .with_block_delay(Duration::from_millis(2))
        .with_track("a.wav", MockTrack::new(1000, 1, 10_000_000, 1));
    let config = EngineConfig {
        fade_in_secs: 0.0,
        fade_out_secs: 0.0,
        block_frames: 100,
        pause_poll_ms: 5,
        ..EngineConfig::default()
    };
    let engine = Arc::new(PlaybackEngine::new(config, Arc::new(backend.clone()), None));
    engine.load(["a.wav"]);

    let handle = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || handle.play()).await.unwrap().unwrap();
    assert!(wait_until(WAIT, || engine.is_playing()));

    let handle = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || handle.stop()).await.unwrap();

    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(backend.stats().outputs_open, 0);
}
