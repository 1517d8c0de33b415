use log::{info, warn, error, debug};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use chrono::{DateTime, Utc};

/// Playback event kept in the in-memory history
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AudioEventType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEventType {
    PlaybackStarted,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackStopped,
    TrackFinished,
    SeekOperation,
    DecodeError,
    StreamError,
}

impl AudioEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEventType::PlaybackStarted => "PLAYBACK_STARTED",
            AudioEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            AudioEventType::PlaybackResumed => "PLAYBACK_RESUMED",
            AudioEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            AudioEventType::TrackFinished => "TRACK_FINISHED",
            AudioEventType::SeekOperation => "SEEK_OPERATION",
            AudioEventType::DecodeError => "DECODE_ERROR",
            AudioEventType::StreamError => "STREAM_ERROR",
        }
    }
}

/// Logger for playback operations. Clones share the same history.
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<AudioEvent>>>,
    max_events: usize,
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioLogger {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events: max_events.max(1),
        }
    }

    /// Initialize logging; `JUKEBOX_LOG_LEVEL` overrides `default_level` when set
    pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var("JUKEBOX_LOG_LEVEL")
            .unwrap_or_else(|_| default_level.to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });
        builder.filter_level(Self::level_filter(&log_level));

        builder.try_init()?;

        info!("Jukebox logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Map a level name to a filter; unknown names mean info
    pub fn level_filter(level: &str) -> log::LevelFilter {
        match level.trim().to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Info,
        }
    }

    /// Record an event and forward it to the standard logger
    pub fn log_event(&self, event_type: AudioEventType, details: String) {
        match event_type {
            AudioEventType::PlaybackStarted
            | AudioEventType::PlaybackStopped
            | AudioEventType::TrackFinished => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::PlaybackPaused
            | AudioEventType::PlaybackResumed
            | AudioEventType::SeekOperation => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::DecodeError => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::StreamError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let event = AudioEvent {
            timestamp: Utc::now(),
            event_type,
            details,
        };

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_playback_started(&self, track_path: &str, format_info: &str) {
        self.log_event(
            AudioEventType::PlaybackStarted,
            format!("Started playing: {} ({})", track_path, format_info),
        );
    }

    pub fn log_playback_stopped(&self, reason: &str) {
        self.log_event(
            AudioEventType::PlaybackStopped,
            format!("Playback stopped: {}", reason),
        );
    }

    pub fn log_track_finished(&self, track_path: &str) {
        self.log_event(
            AudioEventType::TrackFinished,
            format!("Finished: {}", track_path),
        );
    }

    pub fn log_seek(&self, seconds: f64, frame: u64) {
        self.log_event(
            AudioEventType::SeekOperation,
            format!("Seek to {:.2}s (frame {})", seconds, frame),
        );
    }

    /// Most recent events, oldest first
    pub fn recent_events(&self, count: usize) -> Vec<AudioEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
