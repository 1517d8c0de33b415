use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use log::{debug, error, info, warn};

use crate::audio::backend::SystemBackend;
use crate::audio::session::{ControlSnapshot, PlaybackSession, SessionControl, SessionEnd};
use crate::audio::AudioBackend;
use crate::config::EngineConfig;
use crate::error::{AudioError, PlayerError, PlaylistError};
use crate::logging::{AudioEvent, AudioEventType, AudioLogger};
use crate::models::{EngineState, EngineStatus, Track};
use crate::queue::{resolve_paths, scan_folder, Playlist};

/// Invoked on the playback thread with the path of each track that played to its end.
///
/// Must not call back into the engine's control methods.
pub type TrackEndCallback = Box<dyn Fn(&Path) + Send + Sync>;

/// Flags shared between callers and the playback thread
#[derive(Debug)]
struct EngineFlags {
    playlist: Playlist,
    volume: f32,
    paused: bool,
    stop: bool,
    /// Set by stop()/next()/previous()/load() so the thread does not auto-advance
    manual_stop: bool,
    session_active: bool,
    /// True once a decoder and output are open for the current track
    playing: bool,
    fading_out: bool,
    pending_seek: Option<f64>,
    last_error: Option<String>,
}

impl EngineFlags {
    /// Mark the playback thread as done; a later play() starts a fresh one
    fn end_session(&mut self) {
        self.session_active = false;
        self.playing = false;
        self.paused = false;
        self.fading_out = false;
        self.pending_seek = None;
    }
}

struct Shared {
    flags: Mutex<EngineFlags>,
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
    on_track_end: Option<TrackEndCallback>,
    logger: AudioLogger,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the cursor after a track ended on its own. False means go idle,
    /// in which case the session is already marked as ended.
    fn advance_after_end(&self) -> bool {
        let mut flags = self.lock();
        let advanced = if flags.stop || flags.manual_stop {
            false
        } else if !self.config.repeat_playlist && flags.playlist.is_at_last() {
            debug!("Reached end of playlist");
            false
        } else {
            flags.playlist.advance().is_some()
        };
        if !advanced {
            flags.end_session();
        }
        advanced
    }
}

impl SessionControl for Shared {
    fn poll(&self) -> ControlSnapshot {
        let mut flags = self.lock();
        ControlSnapshot {
            stop: flags.stop,
            paused: flags.paused,
            volume: flags.volume,
            seek: flags.pending_seek.take(),
        }
    }

    fn fade_out_started(&self) {
        self.lock().fading_out = true;
    }
}

/// Clears the session flags when the playback thread exits, including by panic
struct WorkerGuard<'a>(&'a Shared);

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().end_session();
    }
}

/// Playlist-driven playback engine.
///
/// At most one playback thread, and therefore one open output, exists at a time.
/// Control methods are safe to call from any thread.
pub struct PlaybackEngine {
    shared: Arc<Shared>,
    /// Serialises play/stop/next/previous/load and owns the playback thread handle
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackEngine {
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn AudioBackend>,
        on_track_end: Option<TrackEndCallback>,
    ) -> Self {
        let config = config.validated();
        if config.crossfade_secs > 0.0 {
            debug!(
                "crossfade_secs = {} is accepted but tracks are played back to back",
                config.crossfade_secs
            );
        }

        let flags = EngineFlags {
            playlist: Playlist::new(),
            volume: config.default_volume,
            paused: false,
            stop: false,
            manual_stop: false,
            session_active: false,
            playing: false,
            fading_out: false,
            pending_seek: None,
            last_error: None,
        };

        Self {
            shared: Arc::new(Shared {
                flags: Mutex::new(flags),
                backend,
                config,
                on_track_end,
                logger: AudioLogger::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Engine on the system audio stack (symphonia + cpal)
    pub fn system(config: EngineConfig, on_track_end: Option<TrackEndCallback>) -> Self {
        let backend = Arc::new(SystemBackend::new(&config));
        Self::new(config, backend, on_track_end)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop any playback and replace the playlist. Relative paths resolve against `media_root`.
    pub fn load<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let tracks = resolve_paths(self.shared.config.media_root.as_deref(), paths);
        self.load_tracks(tracks);
    }

    /// Stop any playback and replace the playlist with already resolved tracks
    pub fn load_tracks(&self, tracks: Vec<Track>) {
        let mut worker = self.lock_worker();
        self.stop_locked(&mut worker);

        info!("Loaded playlist with {} track(s)", tracks.len());
        self.shared.lock().playlist.load(tracks);
    }

    /// Load every supported file in `dir`, sorted by path
    pub fn load_folder(&self, dir: &Path, recursive: bool) -> Result<usize, PlaylistError> {
        let dir = match &self.shared.config.media_root {
            Some(root) if dir.is_relative() => root.join(dir),
            _ => dir.to_path_buf(),
        };
        let tracks = scan_folder(&dir, recursive)?;
        let count = tracks.len();

        let mut worker = self.lock_worker();
        self.stop_locked(&mut worker);

        info!("Loaded {} track(s) from {}", count, dir.display());
        self.shared.lock().playlist.load(tracks);
        Ok(count)
    }

    /// Start the current track, or resume if paused. No-op on an empty playlist.
    pub fn play(&self) -> Result<(), PlayerError> {
        let mut worker = self.lock_worker();
        self.play_locked(&mut worker)
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        self.play()
    }

    fn play_locked(&self, worker: &mut Option<JoinHandle<()>>) -> Result<(), PlayerError> {
        {
            let mut flags = self.shared.lock();
            if flags.playlist.current().is_none() {
                debug!("play() ignored: playlist is empty");
                return Ok(());
            }
            if flags.session_active {
                if flags.paused {
                    flags.paused = false;
                    drop(flags);
                    self.shared.logger.log_event(AudioEventType::PlaybackResumed, "Resumed".to_string());
                }
                return Ok(());
            }
        }

        // The previous thread has cleared session_active and is about to exit
        if let Some(handle) = worker.take() {
            join_worker(handle);
        }

        {
            let mut flags = self.shared.lock();
            flags.stop = false;
            flags.manual_stop = false;
            flags.paused = false;
            flags.fading_out = false;
            flags.pending_seek = None;
            flags.session_active = true;
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("jukebox-playback".to_string())
            .spawn(move || run_worker(shared))
            .map_err(|e| {
                self.shared.lock().session_active = false;
                AudioError::InitializationFailed(format!("Failed to spawn playback thread: {}", e))
            })?;

        *worker = Some(handle);
        Ok(())
    }

    /// Hold the stream at its current position. Idempotent.
    pub fn pause(&self) {
        let mut flags = self.shared.lock();
        if !flags.session_active || flags.paused {
            return;
        }
        flags.paused = true;
        drop(flags);
        self.shared.logger.log_event(AudioEventType::PlaybackPaused, "Paused".to_string());
    }

    /// Stop playback, fading out unless paused, and wait for the playback thread to exit
    pub fn stop(&self) {
        let mut worker = self.lock_worker();
        self.stop_locked(&mut worker);
    }

    fn stop_locked(&self, worker: &mut Option<JoinHandle<()>>) {
        let was_active = {
            let mut flags = self.shared.lock();
            flags.manual_stop = true;
            flags.pending_seek = None;
            if flags.session_active {
                flags.stop = true;
            }
            flags.session_active
        };

        if let Some(handle) = worker.take() {
            if handle.thread().id() == thread::current().id() {
                warn!("stop() called from the playback thread; not waiting for it");
                *worker = Some(handle);
                return;
            }
            join_worker(handle);
        }

        {
            let mut flags = self.shared.lock();
            flags.stop = false;
            flags.paused = false;
            flags.playing = false;
            flags.fading_out = false;
        }

        if was_active {
            self.shared.logger.log_playback_stopped("stopped by caller");
        }
    }

    /// Stop, move to the next track (wrapping) and start it
    pub fn next(&self) -> Result<(), PlayerError> {
        let mut worker = self.lock_worker();
        self.stop_locked(&mut worker);

        if self.shared.lock().playlist.advance().is_none() {
            return Ok(());
        }
        self.play_locked(&mut worker)
    }

    /// Stop, move to the previous track (wrapping) and start it
    pub fn previous(&self) -> Result<(), PlayerError> {
        let mut worker = self.lock_worker();
        self.stop_locked(&mut worker);

        if self.shared.lock().playlist.retreat().is_none() {
            return Ok(());
        }
        self.play_locked(&mut worker)
    }

    /// Request a jump to `seconds` into the current track; applied before the next block
    pub fn seek(&self, seconds: f64) -> Result<(), PlayerError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(AudioError::InvalidState(format!("cannot seek to {}", seconds)).into());
        }

        let mut flags = self.shared.lock();
        if !flags.session_active {
            return Err(AudioError::InvalidState("no active session".to_string()).into());
        }
        flags.pending_seek = Some(seconds);
        Ok(())
    }

    /// Set the volume, clamped to [0.0, 1.0]. Takes effect on the next block.
    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            warn!("Ignoring NaN volume");
            return;
        }
        self.shared.lock().volume = volume.clamp(0.0, 1.0);
    }

    pub fn get_volume(&self) -> f32 {
        self.shared.lock().volume
    }

    /// True while a track is streaming and not paused
    pub fn is_playing(&self) -> bool {
        let flags = self.shared.lock();
        flags.playing && !flags.paused
    }

    pub fn is_paused(&self) -> bool {
        let flags = self.shared.lock();
        flags.session_active && flags.paused
    }

    pub fn current_track(&self) -> Option<Track> {
        self.shared.lock().playlist.current().cloned()
    }

    pub fn playlist(&self) -> Vec<Track> {
        self.shared.lock().playlist.tracks().to_vec()
    }

    pub fn state(&self) -> EngineState {
        state_of(&self.shared.lock())
    }

    pub fn status(&self) -> EngineStatus {
        let flags = self.shared.lock();
        EngineStatus {
            state: state_of(&flags),
            volume: flags.volume,
            current_track: flags.playlist.current().cloned(),
            current_index: flags.playlist.current_index(),
            playlist_len: flags.playlist.len(),
            last_error: flags.last_error.clone(),
        }
    }

    /// Most recent failure to open or stream a track
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    pub fn recent_events(&self, count: usize) -> Vec<AudioEvent> {
        self.shared.logger.recent_events(count)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn state_of(flags: &EngineFlags) -> EngineState {
    if !flags.session_active {
        EngineState::Idle
    } else if flags.fading_out {
        EngineState::StoppingWithFade
    } else if flags.paused {
        EngineState::Paused
    } else {
        EngineState::Streaming
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("Playback thread panicked");
    }
}

/// Playback thread: plays the current track, then keeps advancing until stopped
fn run_worker(shared: Arc<Shared>) {
    let _guard = WorkerGuard(&shared);
    let mut consecutive_failures = 0;

    loop {
        let track = {
            let flags = shared.lock();
            if flags.stop {
                break;
            }
            match flags.playlist.current() {
                Some(track) => track.clone(),
                None => break,
            }
        };

        match play_track(&shared, &track) {
            Ok(SessionEnd::Finished) => {
                consecutive_failures = 0;
                shared.logger.log_track_finished(&track.path().to_string_lossy());
                if let Some(callback) = &shared.on_track_end {
                    callback(track.path());
                }
                if !shared.advance_after_end() {
                    break;
                }
            }
            Ok(SessionEnd::Stopped) => break,
            Err(e) => {
                consecutive_failures += 1;
                let event_type = match e {
                    PlayerError::Decode(_) => AudioEventType::DecodeError,
                    _ => AudioEventType::StreamError,
                };
                shared.logger.log_event(event_type, format!("{}: {}", track.path().display(), e));

                let give_up = {
                    let mut flags = shared.lock();
                    flags.last_error = Some(e.to_string());
                    let give_up = consecutive_failures >= flags.playlist.len();
                    if give_up {
                        flags.end_session();
                    }
                    give_up
                };
                if give_up {
                    warn!("No track in the playlist could be played; going idle");
                    break;
                }
                if !shared.advance_after_end() {
                    break;
                }
            }
        }
    }

    debug!("Playback thread exiting");
}

fn play_track(shared: &Shared, track: &Track) -> Result<SessionEnd, PlayerError> {
    let mut session = PlaybackSession::open(shared.backend.as_ref(), track, &shared.config, shared.logger.clone())?;

    {
        let mut flags = shared.lock();
        flags.playing = true;
        flags.fading_out = false;
    }
    shared.logger.log_playback_started(
        &track.path().to_string_lossy(),
        &format!("{} Hz, {} ch", session.sample_rate(), session.channels()),
    );

    let result = session.run(shared);
    drop(session);

    {
        let mut flags = shared.lock();
        flags.playing = false;
        flags.fading_out = false;
    }
    result
}
