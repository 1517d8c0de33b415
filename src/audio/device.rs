use cpal::{BufferSize, Device, Host, SampleFormat, SampleRate, Stream, StreamConfig};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use crate::audio::buffer::{SampleQueue, SampleReader, SampleWriter};
use crate::audio::AudioOutput;
use crate::error::AudioError;

/// How long a write may wait without the device consuming anything
const WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(2);
const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Enumerates output devices and resolves the configured one
pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Result<Self, AudioError> {
        Ok(DeviceManager {
            host: cpal::default_host(),
        })
    }

    /// Names of all output devices
    pub fn list_devices(&self) -> Result<Vec<String>, AudioError> {
        let devices = self.host.output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    pub fn default_device_name(&self) -> Option<String> {
        self.host.default_output_device().and_then(|device| device.name().ok())
    }

    /// Look up a device by name
    pub fn select_device(&self, device_name: &str) -> Result<Device, AudioError> {
        let mut devices = self.host.output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        devices
            .find(|device| device.name().map(|name| name == device_name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                device: device_name.to_string(),
            })
    }

    /// Select a device by name with fallback to default device
    pub fn select_device_with_fallback(&self, device_name: Option<&str>) -> Result<Device, AudioError> {
        match device_name {
            Some(name) => match self.select_device(name) {
                Ok(device) => Ok(device),
                Err(_) => {
                    warn!("Output device '{}' not found, falling back to default", name);
                    self.select_default_device()
                        .map_err(|_| AudioError::DeviceNotFound {
                            device: name.to_string(),
                        })
                }
            },
            None => self.select_default_device(),
        }
    }

    pub fn select_default_device(&self) -> Result<Device, AudioError> {
        self.host.default_output_device()
            .ok_or_else(|| AudioError::InitializationFailed("No default output device available".to_string()))
    }
}

/// Output stream on a cpal device fed through a bounded [`SampleQueue`].
///
/// The stream is not `Send`, so a `CpalOutput` lives and dies on the thread that opened it.
/// The render callback owns the queue's read end and never takes a lock.
pub struct CpalOutput {
    stream: Option<Stream>,
    queue: SampleWriter,
    failed: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open a stream at the decoder's native rate and channel count
    pub fn open(device: &Device, sample_rate: u32, channels: u16, capacity_frames: usize) -> Result<Self, AudioError> {
        let default_config = device.default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let (queue, reader) = SampleQueue::new(capacity_frames, channels, sample_rate).split();
        let failed = Arc::new(AtomicBool::new(false));

        let sample_format = default_config.sample_format();
        let stream = match sample_format {
            SampleFormat::F32 => Self::create_stream::<f32>(device, &config, reader, &failed)?,
            SampleFormat::I16 => Self::create_stream::<i16>(device, &config, reader, &failed)?,
            SampleFormat::U16 => Self::create_stream::<u16>(device, &config, reader, &failed)?,
            other => {
                return Err(AudioError::InitializationFailed(format!(
                    "Unsupported device sample format: {:?}",
                    other
                )))
            }
        };

        stream.play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;

        debug!(
            "Opened output stream: {} Hz, {} channel(s), {:?}",
            sample_rate, channels, sample_format
        );

        Ok(Self {
            stream: Some(stream),
            queue,
            failed,
        })
    }

    fn create_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut reader: SampleReader,
        failed: &Arc<AtomicBool>,
    ) -> Result<Stream, AudioError>
    where
        T: cpal::SizedSample + cpal::FromSample<i16> + Send + 'static,
    {
        let failed = Arc::clone(failed);
        let rate = config.sample_rate.0;
        let channels = config.channels;

        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                reader.fill(data);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                failed.store(true, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::StreamConfigNotSupported => {
                AudioError::UnsupportedConfig { rate, channels }
            }
            other => AudioError::StreamError(format!("Failed to build output stream: {}", other)),
        })
    }

    fn check_stream(&self) -> Result<(), AudioError> {
        if self.failed.load(Ordering::Relaxed) {
            return Err(AudioError::StreamError("output device reported an error".to_string()));
        }
        if self.stream.is_none() {
            return Err(AudioError::StreamError("output stream is closed".to_string()));
        }
        Ok(())
    }
}

impl AudioOutput for CpalOutput {
    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        let mut offset = 0;
        let mut last_progress = Instant::now();

        while offset < samples.len() {
            self.check_stream()?;

            let written = self.queue.push(&samples[offset..]);
            if written > 0 {
                offset += written;
                last_progress = Instant::now();
                continue;
            }

            if last_progress.elapsed() > WRITE_STALL_TIMEOUT {
                return Err(AudioError::StreamError(
                    "output device stopped consuming samples".to_string(),
                ));
            }
            thread::sleep(WRITE_POLL_INTERVAL);
        }
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), AudioError> {
        let stream = self.stream.as_ref()
            .ok_or_else(|| AudioError::StreamError("output stream is closed".to_string()))?;

        if paused {
            stream.pause()
                .map_err(|e| AudioError::StreamError(format!("Failed to pause stream: {}", e)))
        } else {
            stream.play()
                .map_err(|e| AudioError::StreamError(format!("Failed to resume stream: {}", e)))
        }
    }

    fn flush(&mut self) {
        self.queue.flush();
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        let deadline = Instant::now() + self.queue.buffered_duration() + WRITE_STALL_TIMEOUT;

        while !self.queue.is_empty() {
            self.check_stream()?;
            if Instant::now() > deadline {
                return Err(AudioError::StreamError("timed out draining output".to_string()));
            }
            thread::sleep(WRITE_POLL_INTERVAL);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
            debug!("Closed output stream");
        }
        self.queue.flush();
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These talk to the host audio system; run with `cargo test -- --ignored` on a machine with a sound card.

    #[test]
    #[ignore]
    fn test_device_enumeration() {
        let manager = DeviceManager::new().expect("Failed to create DeviceManager");
        let devices = manager.list_devices().expect("Failed to list devices");

        assert!(!devices.is_empty(), "Should have at least one audio device");
        for device_name in &devices {
            assert!(!device_name.is_empty(), "Device name should not be empty");
        }
    }

    #[test]
    #[ignore]
    fn test_fallback_to_default_device() {
        let manager = DeviceManager::new().expect("Failed to create DeviceManager");

        let device = manager.select_device_with_fallback(Some("NonExistentDevice"));
        assert!(device.is_ok(), "Unknown device should fall back to the default");
    }

    #[test]
    #[ignore]
    fn test_open_write_and_close_output() {
        let manager = DeviceManager::new().expect("Failed to create DeviceManager");
        let device = manager.select_default_device().expect("No default device");
        let mut output = CpalOutput::open(&device, 44100, 2, 4096).expect("Failed to open output");

        output.write(&vec![0i16; 4410 * 2]).unwrap();
        output.drain().unwrap();
        output.close();

        assert!(output.write(&[0, 0]).is_err());
    }

    #[test]
    #[ignore]
    fn test_unknown_device_is_reported() {
        let manager = DeviceManager::new().expect("Failed to create DeviceManager");

        match manager.select_device("NonExistentDevice") {
            Err(AudioError::DeviceNotFound { device }) => assert_eq!(device, "NonExistentDevice"),
            other => panic!("Expected DeviceNotFound error, got {:?}", other.map(|_| ())),
        }
    }
}
