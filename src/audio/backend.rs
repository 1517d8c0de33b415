use std::path::Path;
use crate::audio::decoder::SymphoniaDecoder;
use crate::audio::device::{CpalOutput, DeviceManager};
use crate::audio::{AudioBackend, AudioDecoder, AudioOutput};
use crate::config::EngineConfig;
use crate::error::{AudioError, DecodeError};

/// Production backend: symphonia for decoding, cpal for output
#[derive(Debug, Clone)]
pub struct SystemBackend {
    preferred_device: Option<String>,
    buffer_frames: usize,
}

impl SystemBackend {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            preferred_device: config.preferred_device.clone(),
            buffer_frames: config.block_frames.saturating_mul(config.buffer_blocks),
        }
    }
}

impl AudioBackend for SystemBackend {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn AudioDecoder>, DecodeError> {
        Ok(Box::new(SymphoniaDecoder::open(path)?))
    }

    fn open_output(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioOutput>, AudioError> {
        let device_manager = DeviceManager::new()?;
        let device = device_manager.select_device_with_fallback(self.preferred_device.as_deref())?;

        Ok(Box::new(CpalOutput::open(&device, sample_rate, channels, self.buffer_frames)?))
    }
}
