pub mod backend;
pub mod buffer;
pub mod decoder;
pub mod device;
pub mod engine;
pub mod envelope;
pub mod session;

#[cfg(test)]
pub mod tests;

use std::path::Path;
use std::time::Duration;
use crate::error::{AudioError, DecodeError};

pub use backend::SystemBackend;
pub use buffer::{SampleQueue, SampleReader, SampleWriter};
pub use decoder::SymphoniaDecoder;
pub use device::{CpalOutput, DeviceManager};
pub use engine::{PlaybackEngine, TrackEndCallback};
pub use envelope::SampleEnvelope;
pub use session::PlaybackSession;

/// Incremental decoder producing interleaved 16-bit frames
pub trait AudioDecoder: Send {
    /// Read up to `max_frames` frames. `Ok(None)` once the stream is exhausted.
    fn read_frames(&mut self, max_frames: usize) -> Result<Option<Vec<i16>>, DecodeError>;

    /// Reposition so the next read starts at `frame`
    fn seek(&mut self, frame: u64) -> Result<(), DecodeError>;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Total length, when the container reports it
    fn duration(&self) -> Option<Duration>;
}

/// Sink for processed sample blocks.
///
/// Outputs are created and dropped on the playback thread and never cross threads.
pub trait AudioOutput {
    /// Queue samples for playback, blocking while the device buffer is full
    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError>;

    fn set_paused(&mut self, paused: bool) -> Result<(), AudioError>;

    /// Discard queued samples that have not been rendered yet
    fn flush(&mut self);

    /// Block until queued samples have been rendered
    fn drain(&mut self) -> Result<(), AudioError>;

    fn close(&mut self);
}

/// Opens decoders and output devices for playback sessions
pub trait AudioBackend: Send + Sync {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn AudioDecoder>, DecodeError>;

    fn open_output(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioOutput>, AudioError>;
}
