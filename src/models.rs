use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A playable file. Nothing beyond the path is known until a decoder opens it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Track {
    path: PathBuf,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the display name for this track (file name without extension)
    pub fn display_name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }
}

impl From<PathBuf> for Track {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for Track {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Externally visible engine state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Streaming,
    Paused,
    StoppingWithFade,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Streaming => "streaming",
            EngineState::Paused => "paused",
            EngineState::StoppingWithFade => "stopping",
        }
    }
}

/// Point-in-time snapshot of the engine for status displays
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    pub volume: f32,
    pub current_track: Option<Track>,
    pub current_index: Option<usize>,
    pub playlist_len: usize,
    pub last_error: Option<String>,
}

impl EngineStatus {
    /// One-line summary used by the CLI
    pub fn summary(&self) -> String {
        let track = self
            .current_track
            .as_ref()
            .map(|t| t.display_name())
            .unwrap_or_else(|| "-".to_string());
        let position = match self.current_index {
            Some(index) => format!("{}/{}", index + 1, self.playlist_len),
            None => "0/0".to_string(),
        };
        format!(
            "[{}] {} ({}) volume {:.0}%",
            self.state.as_str(),
            track,
            position,
            self.volume * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_display_name() {
        let track = Track::new("/media/stories/gruffalo.mp3");
        assert_eq!(track.display_name(), "gruffalo");
        assert_eq!(track.path(), Path::new("/media/stories/gruffalo.mp3"));
    }

    #[test]
    fn test_status_summary() {
        let status = EngineStatus {
            state: EngineState::Streaming,
            volume: 0.5,
            current_track: Some(Track::from("a.wav")),
            current_index: Some(0),
            playlist_len: 2,
            last_error: None,
        };
        assert_eq!(status.summary(), "[streaming] a (1/2) volume 50%");
    }

    #[test]
    fn test_status_serializes_to_json() {
        let status = EngineStatus {
            state: EngineState::Idle,
            volume: 1.0,
            current_track: None,
            current_index: None,
            playlist_len: 0,
            last_error: Some("File not found: a.wav".to_string()),
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "Idle");
        assert_eq!(json["playlist_len"], 0);
        assert_eq!(json["last_error"], "File not found: a.wav");
    }
}
