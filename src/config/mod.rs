use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use log::warn;
use crate::error::ConfigError;

/// Longest accepted fade or crossfade
pub const MAX_FADE_SECS: f32 = 60.0;
/// Largest decode block, in frames
pub const MAX_BLOCK_FRAMES: usize = 65_536;
/// Deepest output queue, in blocks
pub const MAX_BUFFER_BLOCKS: usize = 64;

/// Engine configuration, stored as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fade-in length applied at the start of every track
    pub fade_in_secs: f32,
    /// Fade-out length applied when playback is stopped by the caller
    pub fade_out_secs: f32,
    /// Accepted for compatibility; tracks are never blended
    pub crossfade_secs: f32,
    /// Frames pulled from the decoder per loop iteration
    pub block_frames: usize,
    /// Sleep between flag checks while paused
    pub pause_poll_ms: u64,
    pub default_volume: f32,
    /// Output queue depth, in blocks
    pub buffer_blocks: usize,
    /// Wrap to the first track after the last one finishes
    pub repeat_playlist: bool,
    pub preferred_device: Option<String>,
    /// Relative track paths are resolved against this folder
    pub media_root: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fade_in_secs: 1.0,
            fade_out_secs: 1.0,
            crossfade_secs: 3.0,
            block_frames: 1024,
            pause_poll_ms: 50,
            default_volume: 1.0,
            buffer_blocks: 4,
            repeat_playlist: true,
            preferred_device: None,
            media_root: None,
        }
    }
}

impl EngineConfig {
    /// Clamp out-of-range values back into something playable
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !self.fade_in_secs.is_finite() || self.fade_in_secs < 0.0 {
            warn!("Invalid fade_in_secs {}, using {}", self.fade_in_secs, defaults.fade_in_secs);
            self.fade_in_secs = defaults.fade_in_secs;
        } else if self.fade_in_secs > MAX_FADE_SECS {
            warn!("fade_in_secs {} is too long, using {}", self.fade_in_secs, MAX_FADE_SECS);
            self.fade_in_secs = MAX_FADE_SECS;
        }
        if !self.fade_out_secs.is_finite() || self.fade_out_secs < 0.0 {
            warn!("Invalid fade_out_secs {}, using {}", self.fade_out_secs, defaults.fade_out_secs);
            self.fade_out_secs = defaults.fade_out_secs;
        } else if self.fade_out_secs > MAX_FADE_SECS {
            warn!("fade_out_secs {} is too long, using {}", self.fade_out_secs, MAX_FADE_SECS);
            self.fade_out_secs = MAX_FADE_SECS;
        }
        if !self.crossfade_secs.is_finite() || self.crossfade_secs < 0.0 {
            self.crossfade_secs = 0.0;
        }
        self.crossfade_secs = self.crossfade_secs.min(MAX_FADE_SECS);
        if self.block_frames == 0 {
            self.block_frames = defaults.block_frames;
        } else if self.block_frames > MAX_BLOCK_FRAMES {
            warn!("block_frames {} is too large, using {}", self.block_frames, MAX_BLOCK_FRAMES);
            self.block_frames = MAX_BLOCK_FRAMES;
        }
        // Resume latency has to stay under ~100ms
        self.pause_poll_ms = self.pause_poll_ms.clamp(1, 100);
        self.default_volume = if self.default_volume.is_finite() {
            self.default_volume.clamp(0.0, 1.0)
        } else {
            defaults.default_volume
        };
        self.buffer_blocks = self.buffer_blocks.clamp(2, MAX_BUFFER_BLOCKS);
        self
    }

    pub fn fade_in(&self) -> Duration {
        fade_duration(self.fade_in_secs)
    }

    pub fn fade_out(&self) -> Duration {
        fade_duration(self.fade_out_secs)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}

/// Seconds to a fade length; anything that is not a sane length means no fade
fn fade_duration(secs: f32) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(secs.min(MAX_FADE_SECS)).unwrap_or(Duration::ZERO)
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: EngineConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from the default location (`~/.config/rfid-jukebox/config.toml`)
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::with_path(config_path)
    }

    /// Load from an explicit path, falling back to defaults when the file is absent
    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::load_config(&config_path)?.validated();

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut EngineConfig),
    {
        updater(&mut self.config);
        self.config = self.config.clone().validated();
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.default_volume = volume.clamp(0.0, 1.0);
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("rfid-jukebox");

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
        if !path.exists() {
            return Ok(EngineConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_manager = ConfigManager {
            config: EngineConfig::default(),
            config_path,
        };

        (config_manager, temp_dir)
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();

        assert_eq!(config.fade_in_secs, 1.0);
        assert_eq!(config.fade_out_secs, 1.0);
        assert_eq!(config.crossfade_secs, 3.0);
        assert_eq!(config.block_frames, 1024);
        assert_eq!(config.pause_poll(), Duration::from_millis(50));
        assert!(config.repeat_playlist);
        assert_eq!(config.preferred_device, None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("fade_in_secs = 0.5\nrepeat_playlist = false\n").unwrap();

        assert_eq!(config.fade_in_secs, 0.5);
        assert!(!config.repeat_playlist);
        assert_eq!(config.fade_out_secs, 1.0);
        assert_eq!(config.block_frames, 1024);
    }

    #[test]
    fn test_validated_clamps_values() {
        let config = EngineConfig {
            fade_in_secs: -2.0,
            fade_out_secs: f32::NAN,
            block_frames: 0,
            pause_poll_ms: 5000,
            default_volume: 3.0,
            buffer_blocks: 0,
            ..EngineConfig::default()
        }
        .validated();

        assert_eq!(config.fade_in_secs, 1.0);
        assert_eq!(config.fade_out_secs, 1.0);
        assert_eq!(config.block_frames, 1024);
        assert_eq!(config.pause_poll_ms, 100);
        assert_eq!(config.default_volume, 1.0);
        assert_eq!(config.buffer_blocks, 2);
    }

    #[test]
    fn test_validated_caps_huge_values() {
        let config: EngineConfig = toml::from_str(
            "fade_in_secs = 1e30\nfade_out_secs = 1e30\ncrossfade_secs = 1e30\n\
             block_frames = 9223372036854775807\nbuffer_blocks = 9223372036854775807\n",
        )
        .unwrap();
        let config = config.validated();

        assert_eq!(config.fade_in_secs, MAX_FADE_SECS);
        assert_eq!(config.fade_out_secs, MAX_FADE_SECS);
        assert_eq!(config.crossfade_secs, MAX_FADE_SECS);
        assert_eq!(config.block_frames, MAX_BLOCK_FRAMES);
        assert_eq!(config.buffer_blocks, MAX_BUFFER_BLOCKS);
        assert_eq!(config.fade_in(), Duration::from_secs(60));
        assert_eq!(config.fade_out(), Duration::from_secs(60));
    }

    #[test]
    fn test_fade_lengths_never_panic() {
        // Fields are public, so an unvalidated config can still reach a session
        let config = EngineConfig {
            fade_in_secs: 1e30,
            fade_out_secs: f32::NAN,
            ..EngineConfig::default()
        };

        assert_eq!(config.fade_in(), Duration::from_secs(60));
        assert_eq!(config.fade_out(), Duration::ZERO);

        let negative = EngineConfig { fade_in_secs: -1.0, ..EngineConfig::default() };
        assert_eq!(negative.fade_in(), Duration::ZERO);
    }

    #[test]
    fn test_save_and_load_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.config.fade_in_secs = 2.5;
        config_manager.config.preferred_device = Some("USB Speaker".to_string());
        config_manager.config.media_root = Some(PathBuf::from("/srv/audio"));
        config_manager.save_config().unwrap();

        let loaded = ConfigManager::load_config(&config_manager.config_path).unwrap();

        assert_eq!(loaded.fade_in_secs, 2.5);
        assert_eq!(loaded.preferred_device, Some("USB Speaker".to_string()));
        assert_eq!(loaded.media_root, Some(PathBuf::from("/srv/audio")));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("missing.toml")).unwrap();

        assert_eq!(manager.get_config(), &EngineConfig::default());
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [[[").unwrap();

        match ConfigManager::load_config(&config_path) {
            Err(ConfigError::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_set_volume_persists_clamped() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_volume(1.5).unwrap();
        assert_eq!(config_manager.config.default_volume, 1.0);

        let loaded = ConfigManager::load_config(&config_manager.config_path).unwrap();
        assert_eq!(loaded.default_volume, 1.0);
    }

    #[test]
    fn test_update_config_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("config.toml");
        let mut manager = ConfigManager {
            config: EngineConfig::default(),
            config_path: nested_path.clone(),
        };

        manager.update_config(|config| config.pause_poll_ms = 20).unwrap();

        assert!(nested_path.exists());
        let loaded = ConfigManager::load_config(&nested_path).unwrap();
        assert_eq!(loaded.pause_poll_ms, 20);
    }
}
