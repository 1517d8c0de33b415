use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use rfid_jukebox::audio::{DeviceManager, PlaybackEngine, TrackEndCallback};
use rfid_jukebox::cli::{CliApp, Commands, ParseError, StatusDisplay};
use rfid_jukebox::config::ConfigManager;
use rfid_jukebox::error::{AudioError, ErrorSeverity, PlayerError, PlaylistError};
use rfid_jukebox::logging::AudioLogger;
use rfid_jukebox::models::{EngineState, Track};
use rfid_jukebox::queue::{expand_folders, resolve_paths};

/// Main application controller that wires the CLI to the playback engine
pub struct AppController {
    engine: Arc<PlaybackEngine>,
    config_manager: ConfigManager,
    finished_rx: UnboundedReceiver<PathBuf>,
}

impl AppController {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, PlayerError> {
        // Interactive use stays quiet unless asked otherwise
        if let Err(e) = AudioLogger::init("warn") {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        let config_manager = match config_path {
            Some(path) => ConfigManager::with_path(path)?,
            None => ConfigManager::new()?,
        };
        info!("Using configuration at {}", config_manager.config_path().display());

        let (finished_tx, finished_rx) = unbounded_channel();
        let on_track_end: TrackEndCallback = Box::new(move |path| {
            let _ = finished_tx.send(path.to_path_buf());
        });
        let engine = PlaybackEngine::system(config_manager.get_config().clone(), Some(on_track_end));

        Ok(Self {
            engine: Arc::new(engine),
            config_manager,
            finished_rx,
        })
    }

    /// Run an engine call off the async runtime; control calls may block on the playback thread
    async fn with_engine<F, T>(&self, call: F) -> Result<T, PlayerError>
    where
        F: FnOnce(&PlaybackEngine) -> Result<T, PlayerError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || call(&engine))
            .await
            .map_err(|e| {
                PlayerError::Audio(AudioError::InvalidState(format!("Engine task failed: {}", e)))
            })?
    }

    /// Execute a single command
    pub async fn execute_command(&mut self, command: Commands) -> Result<(), PlayerError> {
        match command {
            Commands::Play { paths, recursive, volume } => {
                if !paths.is_empty() {
                    let media_root = self.engine.config().media_root.clone();
                    let tracks = resolve_paths(media_root.as_deref(), &paths);
                    let tracks = expand_folders(tracks, recursive)?;
                    if tracks.is_empty() {
                        let listed: Vec<String> =
                            paths.iter().map(|p| p.display().to_string()).collect();
                        return Err(PlaylistError::NoAudioFiles { path: listed.join(", ") }.into());
                    }
                    println!("Loaded {} track(s)", tracks.len());
                    self.with_engine(move |engine| {
                        engine.load_tracks(tracks);
                        Ok(())
                    })
                    .await?;
                }

                if let Some(level) = volume {
                    self.engine.set_volume(f32::from(level) / 100.0);
                }

                if self.engine.playlist().is_empty() {
                    println!("Playlist is empty. Use 'play <file or folder>' to load something.");
                    return Ok(());
                }

                self.with_engine(|engine| engine.play()).await?;
                if let Some(track) = self.engine.current_track() {
                    println!("Now playing: {}", track.display_name());
                }
            }
            Commands::Pause => {
                self.engine.pause();
                println!("Paused");
            }
            Commands::Resume => {
                self.with_engine(|engine| engine.resume()).await?;
                println!("Resumed");
            }
            Commands::Stop => {
                self.with_engine(|engine| {
                    engine.stop();
                    Ok(())
                })
                .await?;
                println!("Stopped");
            }
            Commands::Next => {
                self.with_engine(|engine| engine.next()).await?;
                if let Some(track) = self.engine.current_track() {
                    println!("Now playing: {}", track.display_name());
                }
            }
            Commands::Prev => {
                self.with_engine(|engine| engine.previous()).await?;
                if let Some(track) = self.engine.current_track() {
                    println!("Now playing: {}", track.display_name());
                }
            }
            Commands::Seek { position } => {
                let target = CliApp::parse_time(&position)?;
                self.engine.seek(target.as_secs_f64())?;
                println!("Seeking to {}", CliApp::format_duration(target));
            }
            Commands::Volume { level } => {
                self.engine.set_volume(f32::from(level) / 100.0);
                println!("Volume set to {}%", level);
            }
            Commands::Status => {
                let status = self.engine.status();
                StatusDisplay::display_full_status(&status, &self.engine.playlist());
            }
            Commands::Events { count } => {
                StatusDisplay::display_events(&self.engine.recent_events(count));
            }
            Commands::Devices => {
                let device_manager = DeviceManager::new()?;
                let default = device_manager.default_device_name();
                let devices = device_manager.list_devices()?;
                if devices.is_empty() {
                    println!("No output devices found");
                }
                for name in devices {
                    let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
                    println!("{} {}", marker, name);
                }
            }
        }

        Ok(())
    }

    /// Run the interactive command loop until exit, EOF or Ctrl-C
    pub async fn run_interactive_mode(&mut self) -> Result<(), PlayerError> {
        println!("RFID Jukebox - type 'help' for commands, 'exit' to quit");

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = Arc::clone(&shutdown_flag);
        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Shutting down gracefully...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // Blocking stdin reads live on their own thread
        let (tx, mut rx) = unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut interval = tokio::time::interval(Duration::from_millis(100));
        let mut awaiting_input = false;
        let mut last_seen = (EngineState::Idle, None);

        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = rx.recv() => {
                    awaiting_input = false;
                    let Some(line) = line else {
                        println!();
                        break;
                    };
                    if line.is_empty() {
                        continue;
                    }
                    if line == "exit" || line == "quit" {
                        println!("Goodbye!");
                        break;
                    }
                    match CliApp::parse_command(&line) {
                        Ok(command) => {
                            if let Err(e) = self.execute_command(command).await {
                                Self::report_error(&e);
                            }
                            // Commands print their own outcome
                            let status = self.engine.status();
                            last_seen = (status.state, status.current_index);
                        }
                        Err(ParseError::HelpRequested) => CliApp::display_help(),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            println!("Type 'help' for available commands.");
                        }
                    }
                }

                Some(path) = self.finished_rx.recv() => {
                    info!("Track finished: {}", path.display());
                    println!("\nFinished: {}", Track::new(path).display_name());
                    awaiting_input = false;
                }

                _ = interval.tick() => {
                    let status = self.engine.status();
                    let now = (status.state, status.current_index);
                    if now != last_seen {
                        match status.state {
                            EngineState::Streaming if now.1 != last_seen.1 || last_seen.0 == EngineState::Idle => {
                                if let Some(track) = &status.current_track {
                                    println!("\nNow playing: {}", track.display_name());
                                    awaiting_input = false;
                                }
                            }
                            EngineState::Idle if last_seen.0 != EngineState::Idle => {
                                if let Some(err) = &status.last_error {
                                    println!("\nPlayback ended ({})", err);
                                } else {
                                    println!("\nPlayback ended");
                                }
                                awaiting_input = false;
                            }
                            _ => {}
                        }
                        last_seen = now;
                    }
                }
            }
        }

        Ok(())
    }

    /// Stop playback and persist the volume for the next start
    pub async fn shutdown(&mut self) -> Result<(), PlayerError> {
        println!("Shutting down...");

        self.with_engine(|engine| {
            engine.stop();
            Ok(())
        })
        .await?;

        let volume = self.engine.get_volume();
        if let Err(e) = self.config_manager.set_volume(volume) {
            eprintln!("Warning: Error saving configuration: {}", e);
        }

        println!("Shutdown complete.");
        Ok(())
    }

    fn report_error(error: &PlayerError) {
        match error.severity() {
            ErrorSeverity::Info => info!("{}", error),
            ErrorSeverity::Warning => warn!("{}", error),
            ErrorSeverity::Error => error!("{}", error),
        }
        StatusDisplay::display_error_with_recovery(error);
    }
}

#[tokio::main]
async fn main() {
    let cli = CliApp::parse();

    let mut app = match AppController::new(cli.config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
    };

    // Playing from the command line keeps the session open for further commands
    let interactive = matches!(cli.command, None | Some(Commands::Play { .. }));

    if let Some(command) = cli.command {
        if let Err(e) = app.execute_command(command).await {
            AppController::report_error(&e);
            if !interactive || !e.is_recoverable() {
                std::process::exit(1);
            }
        }
    }

    if interactive {
        if let Err(e) = app.run_interactive_mode().await {
            AppController::report_error(&e);
        }
        if let Err(e) = app.shutdown().await {
            AppController::report_error(&e);
            std::process::exit(1);
        }
    }

    info!("Application shutdown complete");
}
