use std::thread;
use std::time::Duration;
use log::{debug, warn};
use crate::audio::envelope::{frames_for, SampleEnvelope};
use crate::audio::{AudioBackend, AudioDecoder, AudioOutput};
use crate::config::EngineConfig;
use crate::error::{DecodeError, PlayerError};
use crate::logging::AudioLogger;
use crate::models::Track;

/// Control flags as seen by the playback loop at the top of each block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSnapshot {
    pub stop: bool,
    pub paused: bool,
    pub volume: f32,
    /// Pending seek target in seconds, consumed by the read
    pub seek: Option<f64>,
}

/// Source of control flags for a running session
pub trait SessionControl {
    fn poll(&self) -> ControlSnapshot;

    /// Called once when a requested stop turns into a fade-out
    fn fade_out_started(&self) {}
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Decoder ran out of frames
    Finished,
    /// A stop request was honoured
    Stopped,
}

/// One track being streamed: decoder, output handle and envelope.
///
/// The output is closed when the session is dropped.
pub struct PlaybackSession {
    track: Track,
    decoder: Box<dyn AudioDecoder>,
    output: Box<dyn AudioOutput>,
    envelope: SampleEnvelope,
    sample_rate: u32,
    channels: u16,
    block_frames: usize,
    fade_out: Duration,
    pause_poll: Duration,
    output_paused: bool,
    logger: AudioLogger,
}

impl PlaybackSession {
    /// Open the decoder, then an output matching its rate and channel count
    pub fn open(
        backend: &dyn AudioBackend,
        track: &Track,
        config: &EngineConfig,
        logger: AudioLogger,
    ) -> Result<Self, PlayerError> {
        let decoder = backend.open_decoder(track.path())?;
        let sample_rate = decoder.sample_rate();
        let channels = decoder.channels();

        let output = backend.open_output(sample_rate, channels)?;

        Ok(Self {
            track: track.clone(),
            decoder,
            output,
            envelope: SampleEnvelope::from_duration(config.fade_in(), sample_rate),
            sample_rate,
            channels,
            block_frames: config.block_frames.max(1),
            fade_out: config.fade_out(),
            pause_poll: config.pause_poll(),
            output_paused: false,
            logger,
        })
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn duration(&self) -> Option<Duration> {
        self.decoder.duration()
    }

    pub fn frames_played(&self) -> u64 {
        self.envelope.frames_played()
    }

    /// Reposition the decoder and drop audio already queued at the old position.
    /// The envelope keeps counting, so a seek never restarts the fade-in.
    pub fn seek(&mut self, seconds: f64) -> Result<u64, DecodeError> {
        let frame = (seconds.max(0.0) * self.sample_rate as f64) as u64;
        self.decoder.seek(frame)?;
        self.output.flush();
        self.logger.log_seek(seconds, frame);
        Ok(frame)
    }

    /// Stream blocks until the track ends or a stop request completes
    pub fn run(&mut self, control: &dyn SessionControl) -> Result<SessionEnd, PlayerError> {
        loop {
            let flags = control.poll();

            if let Some(seconds) = flags.seek {
                if let Err(e) = self.seek(seconds) {
                    warn!("Seek to {:.2}s in {} failed: {}", seconds, self.track.path().display(), e);
                }
            }

            if flags.stop {
                // A paused stream is silent already
                if flags.paused {
                    self.output.flush();
                    return Ok(SessionEnd::Stopped);
                }
                if !self.envelope.is_fading_out() {
                    let fade_frames = frames_for(self.fade_out, self.sample_rate);
                    if fade_frames == 0 {
                        self.output.flush();
                        return Ok(SessionEnd::Stopped);
                    }
                    debug!("Fading out over {} frames", fade_frames);
                    self.envelope.begin_fade_out(fade_frames);
                    control.fade_out_started();
                }
            }

            if flags.paused != self.output_paused {
                self.output.set_paused(flags.paused)?;
                self.output_paused = flags.paused;
            }

            if flags.paused {
                thread::sleep(self.pause_poll);
                continue;
            }

            let mut block = match self.decoder.read_frames(self.block_frames)? {
                Some(block) => block,
                None => {
                    self.output.drain()?;
                    return Ok(if self.envelope.is_fading_out() {
                        SessionEnd::Stopped
                    } else {
                        SessionEnd::Finished
                    });
                }
            };

            self.envelope.apply(&mut block, self.channels, flags.volume);
            self.output.write(&block)?;

            if self.envelope.fade_out_complete() {
                self.output.drain()?;
                return Ok(SessionEnd::Stopped);
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.output.close();
        debug!("Closed session for {}", self.track.path().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::mock::{MockBackend, MockTrack};
    use std::cell::Cell;

    /// Scripted control: each poll returns the next snapshot, repeating the last
    struct Script {
        steps: Vec<ControlSnapshot>,
        index: Cell<usize>,
        fades: Cell<usize>,
    }

    impl Script {
        fn new(steps: Vec<ControlSnapshot>) -> Self {
            Self { steps, index: Cell::new(0), fades: Cell::new(0) }
        }
    }

    impl SessionControl for Script {
        fn poll(&self) -> ControlSnapshot {
            let i = self.index.get();
            self.index.set(i + 1);
            self.steps[i.min(self.steps.len() - 1)]
        }

        fn fade_out_started(&self) {
            self.fades.set(self.fades.get() + 1);
        }
    }

    fn playing(volume: f32) -> ControlSnapshot {
        ControlSnapshot { stop: false, paused: false, volume, seek: None }
    }

    fn config(fade_in_secs: f32, fade_out_secs: f32) -> EngineConfig {
        EngineConfig {
            fade_in_secs,
            fade_out_secs,
            block_frames: 100,
            pause_poll_ms: 1,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_runs_to_natural_end() {
        let backend = MockBackend::new().with_track("a.wav", MockTrack::new(1000, 2, 450, 1000));
        let mut session = PlaybackSession::open(&backend, &Track::from("a.wav"), &config(0.0, 0.0), AudioLogger::new()).unwrap();

        let end = session.run(&Script::new(vec![playing(0.5)])).unwrap();

        assert_eq!(end, SessionEnd::Finished);
        assert_eq!(session.frames_played(), 450);
        let stats = backend.stats();
        assert_eq!(stats.samples.len(), 900);
        assert!(stats.samples.iter().all(|&s| s == 500));
        assert_eq!(stats.drains, 1);
    }

    #[test]
    fn test_fade_in_applied_across_blocks() {
        let backend = MockBackend::new().with_track("a.wav", MockTrack::new(1000, 1, 300, 10000));
        let mut session = PlaybackSession::open(&backend, &Track::from("a.wav"), &config(0.2, 0.0), AudioLogger::new()).unwrap();

        session.run(&Script::new(vec![playing(1.0)])).unwrap();

        let samples = backend.stats().samples;
        assert_eq!(samples[0], 0);
        assert_eq!(samples[100], 5000);
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        assert!(samples[200..].iter().all(|&s| s == 10000));
    }

    #[test]
    fn test_stop_fades_out() {
        let backend = MockBackend::new().with_track("a.wav", MockTrack::new(1000, 1, 10_000, 10000));
        let mut session = PlaybackSession::open(&backend, &Track::from("a.wav"), &config(0.0, 0.25), AudioLogger::new()).unwrap();

        let stop = ControlSnapshot { stop: true, ..playing(1.0) };
        let script = Script::new(vec![playing(1.0), playing(1.0), stop]);
        let end = session.run(&script).unwrap();

        assert_eq!(end, SessionEnd::Stopped);
        assert_eq!(script.fades.get(), 1);
        let samples = backend.stats().samples;
        // Two full blocks, then a 250 frame ramp padded to whole blocks
        assert_eq!(samples.len(), 500);
        assert!(samples[..200].iter().all(|&s| s == 10000));
        assert!(samples[200..].windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(*samples.last().unwrap(), 0);
    }

    #[test]
    fn test_stop_while_paused_skips_fade() {
        let backend = MockBackend::new().with_track("a.wav", MockTrack::new(1000, 1, 10_000, 10000));
        let mut session = PlaybackSession::open(&backend, &Track::from("a.wav"), &config(0.0, 1.0), AudioLogger::new()).unwrap();

        let paused = ControlSnapshot { paused: true, ..playing(1.0) };
        let stop = ControlSnapshot { stop: true, paused: true, ..playing(1.0) };
        let script = Script::new(vec![playing(1.0), paused, paused, stop]);
        let end = session.run(&script).unwrap();

        assert_eq!(end, SessionEnd::Stopped);
        assert_eq!(script.fades.get(), 0);
        assert_eq!(session.frames_played(), 100);
        let stats = backend.stats();
        assert_eq!(stats.pause_calls, vec![true]);
        assert_eq!(stats.samples.len(), 100);
    }

    #[test]
    fn test_pause_and_resume_keeps_position() {
        let backend = MockBackend::new().with_track("a.wav", MockTrack::new(1000, 1, 300, 10000));
        let mut session = PlaybackSession::open(&backend, &Track::from("a.wav"), &config(0.2, 0.0), AudioLogger::new()).unwrap();

        let paused = ControlSnapshot { paused: true, ..playing(1.0) };
        let script = Script::new(vec![playing(1.0), paused, paused, playing(1.0)]);
        let end = session.run(&script).unwrap();

        assert_eq!(end, SessionEnd::Finished);
        assert_eq!(session.frames_played(), 300);
        let stats = backend.stats();
        assert_eq!(stats.pause_calls, vec![true, false]);
        // No second ramp after resuming
        assert_eq!(stats.samples[100], 5000);
        assert!(stats.samples.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_seek_flushes_and_repositions() {
        let backend = MockBackend::new().with_track("a.wav", MockTrack::new(1000, 1, 5000, 1000));
        let mut session = PlaybackSession::open(&backend, &Track::from("a.wav"), &config(0.0, 0.0), AudioLogger::new()).unwrap();

        let seek = ControlSnapshot { seek: Some(4.5), ..playing(1.0) };
        let end = session.run(&Script::new(vec![playing(1.0), seek, playing(1.0)])).unwrap();

        assert_eq!(end, SessionEnd::Finished);
        let stats = backend.stats();
        assert_eq!(stats.seeks, vec![4500]);
        assert_eq!(stats.flushes, 1);
        // 100 frames before the seek, 500 after it
        assert_eq!(stats.samples.len(), 600);
        assert_eq!(session.frames_played(), 600);
    }

    #[test]
    fn test_output_closed_on_drop() {
        let backend = MockBackend::new().with_track("a.wav", MockTrack::new(1000, 1, 100, 1));
        let session = PlaybackSession::open(&backend, &Track::from("a.wav"), &config(0.0, 0.0), AudioLogger::new()).unwrap();
        assert_eq!(backend.stats().outputs_open, 1);

        drop(session);
        assert_eq!(backend.stats().outputs_open, 0);
        assert_eq!(backend.stats().outputs_closed, 1);
    }

    #[test]
    fn test_open_fails_for_unknown_track() {
        let backend = MockBackend::new();
        let result = PlaybackSession::open(&backend, &Track::from("missing.wav"), &config(0.0, 0.0), AudioLogger::new());

        assert!(matches!(result, Err(PlayerError::Decode(DecodeError::FileNotFound { .. }))));
        assert_eq!(backend.stats().outputs_opened, 0);
    }
}
