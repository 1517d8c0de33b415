use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub mod status;
pub use status::StatusDisplay;

/// RFID jukebox playback engine
#[derive(Parser)]
#[command(name = "jukebox")]
#[command(about = "Plays audio files and folders with fades, driven from stdin or a tag reader")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Configuration file (defaults to ~/.config/rfid-jukebox/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands. All of them are accepted interactively as well.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Commands {
    /// Load files or folders and start playback
    Play {
        /// Files or directories; without any, resumes the current playlist
        paths: Vec<PathBuf>,
        /// Include subfolders when a directory is given
        #[arg(short, long)]
        recursive: bool,
        /// Initial volume (0-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: Option<u8>,
    },
    /// Pause playback while preserving position
    Pause,
    /// Resume playback from paused position
    Resume,
    /// Stop playback, fading out
    Stop,
    /// Advance to next track in the playlist
    Next,
    /// Go back to previous track in the playlist
    #[command(alias = "previous")]
    Prev,
    /// Seek within the current track
    Seek {
        /// Time offset (e.g., "1:30", "90", "90s")
        position: String,
    },
    /// Set playback volume (0-100)
    Volume {
        /// Volume level (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },
    /// Display engine state, track and playlist
    Status,
    /// Show recent playback events
    Events {
        #[arg(default_value_t = 10)]
        count: usize,
    },
    /// List audio output devices
    Devices,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<Commands, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0] {
            "play" => {
                let mut recursive = false;
                let mut rest = &args[1..];
                if let Some(&flag) = rest.first() {
                    if flag == "-r" || flag == "--recursive" {
                        recursive = true;
                        rest = &rest[1..];
                    }
                }
                let paths = if rest.is_empty() {
                    Vec::new()
                } else {
                    vec![Self::expand_path(&rest.join(" "))]
                };
                Ok(Commands::Play { paths, recursive, volume: None })
            }
            "pause" => Ok(Commands::Pause),
            "resume" => Ok(Commands::Resume),
            "stop" => Ok(Commands::Stop),
            "next" => Ok(Commands::Next),
            "prev" | "previous" => Ok(Commands::Prev),
            "seek" => match args.get(1) {
                Some(position) => Ok(Commands::Seek {
                    position: position.to_string(),
                }),
                None => Err(ParseError::MissingArgument {
                    command: "seek".to_string(),
                    argument: "position".to_string(),
                }),
            },
            "volume" => match args.get(1) {
                Some(value) => match value.parse::<u8>() {
                    Ok(level) if level <= 100 => Ok(Commands::Volume { level }),
                    _ => Err(ParseError::InvalidArgument {
                        argument: "volume level".to_string(),
                        value: value.to_string(),
                        expected: "number 0-100".to_string(),
                    }),
                },
                None => Err(ParseError::MissingArgument {
                    command: "volume".to_string(),
                    argument: "level".to_string(),
                }),
            },
            "status" => Ok(Commands::Status),
            "events" => match args.get(1) {
                Some(value) => value
                    .parse::<usize>()
                    .map(|count| Commands::Events { count })
                    .map_err(|_| ParseError::InvalidArgument {
                        argument: "count".to_string(),
                        value: value.to_string(),
                        expected: "a positive number".to_string(),
                    }),
                None => Ok(Commands::Events { count: 10 }),
            },
            "devices" => Ok(Commands::Devices),
            "help" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    /// Display help information
    pub fn display_help() {
        println!("RFID Jukebox - Available Commands:");
        println!();
        println!("Playback Control:");
        println!("  play [-r] [path]  - Load a file or folder and play; without a path, play/resume");
        println!("  pause             - Pause playback");
        println!("  resume            - Resume playback");
        println!("  stop              - Fade out and stop");
        println!("  next              - Next track");
        println!("  prev              - Previous track");
        println!("  seek <time>       - Seek to position (e.g., '1:30', '90s')");
        println!("  volume <0-100>    - Set volume level");
        println!();
        println!("Information:");
        println!("  status            - Show engine state and playlist");
        println!("  events [n]        - Show the last n playback events");
        println!("  devices           - List audio output devices");
        println!();
        println!("General:");
        println!("  help              - Show this help message");
        println!("  exit, quit        - Exit the player");
    }

    /// Parse a time offset: "90", "90s", "1:30" or "1:30.5"
    pub fn parse_time(time_str: &str) -> Result<Duration, ParseError> {
        let trimmed = time_str.trim();
        let invalid = || ParseError::InvalidTimeFormat {
            input: time_str.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        let seconds = if let Some((minutes, seconds)) = trimmed.split_once(':') {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(invalid());
            }
            minutes as f64 * 60.0 + seconds
        } else {
            let seconds: f64 = trimmed.trim_end_matches('s').parse().map_err(|_| invalid())?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(invalid());
            }
            seconds
        };

        Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },

    #[error("Help requested")]
    HelpRequested,
}
