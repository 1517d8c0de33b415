

use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::TrackEndCallback;
use crate::config::EngineConfig;

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Small blocks, no fades, fast pause polling
pub fn test_config() -> EngineConfig {
    EngineConfig {
        fade_in_secs: 0.0,
        fade_out_secs: 0.0,
        block_frames: 100,
        pause_poll_ms: 5,
        ..EngineConfig::default()
    }
}

/// Callback forwarding finished track paths to a channel
pub fn track_end_channel() -> (TrackEndCallback, Receiver<PathBuf>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let callback: TrackEndCallback = Box::new(move |path| {
        let _ = tx.lock().unwrap().send(path.to_path_buf());
    });
    (callback, rx)
}
