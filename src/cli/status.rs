use std::time::Duration;

use crate::error::{AudioError, DecodeError, ErrorSeverity, PlayerError, PlaylistError};
use crate::logging::AudioEvent;
use crate::models::{EngineState, EngineStatus, Track};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display engine state, current track and the playlist around it
    pub fn display_full_status(status: &EngineStatus, playlist: &[Track]) {
        println!("┌─ Jukebox Status ────────────────────────────────────────┐");
        println!("│ State: {}", Self::format_engine_state(status.state));

        match &status.current_track {
            Some(track) => {
                println!("│ Track: {}", Self::truncate(&track.display_name(), 50));
                println!("│ Path: {}", Self::truncate(&track.path().display().to_string(), 49));
            }
            None => println!("│ No track loaded"),
        }

        println!("│ Volume: {}%", (status.volume * 100.0).round() as u8);

        if let Some(error) = &status.last_error {
            println!("│");
            for line in Self::wrap_text(&format!("Last error: {}", error), 55) {
                println!("│ {}", line);
            }
        }

        if !playlist.is_empty() {
            println!("│");
            println!("│ Playlist ({} tracks):", playlist.len());
            for (index, track) in playlist.iter().enumerate() {
                let marker = if status.current_index == Some(index) { "▶" } else { " " };
                println!(
                    "│ {} {:>3}. {}",
                    marker,
                    index + 1,
                    Self::truncate(&track.display_name(), 45)
                );
            }
        }

        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display recent playback events, oldest first
    pub fn display_events(events: &[AudioEvent]) {
        if events.is_empty() {
            println!("No playback events recorded");
            return;
        }
        for event in events {
            println!(
                "{} {:<12} {}",
                event.timestamp.format("%H:%M:%S%.3f"),
                event.event_type.as_str(),
                event.details
            );
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        if let Some(hint) = Self::error_hint(error) {
            eprintln!("│");
            eprintln!("│ {}", hint);
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display an error followed by whether the player can carry on after it
    pub fn display_error_with_recovery(error: &PlayerError) {
        Self::display_error(error);
        eprintln!("{}", Self::recovery_note(error));
    }

    pub fn recovery_note(error: &PlayerError) -> &'static str {
        if error.is_recoverable() {
            "The player is still running; correct the command and try again."
        } else {
            "⚠  This error requires manual intervention to resolve."
        }
    }

    /// Extra context for errors a user can act on directly
    pub fn error_hint(error: &PlayerError) -> Option<&'static str> {
        match error {
            PlayerError::Audio(AudioError::DeviceNotFound { .. }) => {
                Some("Use 'devices' to see available outputs")
            }
            PlayerError::Audio(AudioError::UnsupportedConfig { .. }) => {
                Some("Common rates: 44.1kHz, 48kHz")
            }
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => {
                Some("Supported: FLAC, WAV, MP3, OGG/Vorbis, AAC/M4A")
            }
            PlayerError::Playlist(PlaylistError::NoAudioFiles { .. }) => {
                Some("Point 'play' at a folder that contains audio files")
            }
            PlayerError::Config(_) => Some("Configuration will use default values"),
            _ => None,
        }
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &PlayerError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        lines
    }

    /// Format duration as MM:SS or HH:MM:SS for longer tracks
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    pub fn format_engine_state(state: EngineState) -> String {
        match state {
            EngineState::Streaming => "▶ Playing".to_string(),
            EngineState::Paused => "⏸ Paused".to_string(),
            EngineState::StoppingWithFade => "⏬ Fading out".to_string(),
            EngineState::Idle => "⏹ Idle".to_string(),
        }
    }
}
