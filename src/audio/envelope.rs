//! Sample-level gain envelope: fade-in ramp, steady volume, fade-out ramp.
//!
//! Gains are applied per frame, so every channel of a frame is scaled by the
//! same factor. Scaled samples are truncated toward zero and clamped to the
//! i16 range.

use std::time::Duration;

/// Number of frames covering `duration` at `sample_rate`
pub fn frames_for(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64) as u64
}

/// Scale one sample, truncating toward zero
#[inline]
pub fn scale_sample(sample: i16, gain: f32) -> i16 {
    let scaled = (sample as f64 * gain as f64).trunc();
    scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FadeOut {
    total: u64,
    elapsed: u64,
}

impl FadeOut {
    fn factor(&self) -> f64 {
        if self.elapsed >= self.total {
            0.0
        } else {
            (self.total - self.elapsed) as f64 / self.total as f64
        }
    }
}

/// Gain envelope for one track.
///
/// `frames_played` persists across blocks so a fade-in spanning several
/// blocks stays continuous.
#[derive(Debug, Clone)]
pub struct SampleEnvelope {
    fade_in_frames: u64,
    frames_played: u64,
    fade_out: Option<FadeOut>,
}

impl SampleEnvelope {
    pub fn new(fade_in_frames: u64) -> Self {
        Self {
            fade_in_frames,
            frames_played: 0,
            fade_out: None,
        }
    }

    pub fn from_duration(fade_in: Duration, sample_rate: u32) -> Self {
        Self::new(frames_for(fade_in, sample_rate))
    }

    pub fn fade_in_frames(&self) -> u64 {
        self.fade_in_frames
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played
    }

    /// Fade-in gain at a global frame offset, ignoring any fade-out
    pub fn gain_at(&self, frame: u64, volume: f32) -> f32 {
        if frame >= self.fade_in_frames {
            volume
        } else {
            (frame as f64 / self.fade_in_frames as f64 * volume as f64) as f32
        }
    }

    /// Start ramping to silence over `frames` frames. Ignored if already fading out.
    pub fn begin_fade_out(&mut self, frames: u64) {
        if self.fade_out.is_none() {
            self.fade_out = Some(FadeOut { total: frames, elapsed: 0 });
        }
    }

    pub fn is_fading_out(&self) -> bool {
        self.fade_out.is_some()
    }

    pub fn fade_out_complete(&self) -> bool {
        matches!(self.fade_out, Some(fade) if fade.elapsed >= fade.total)
    }

    /// Scale an interleaved block in place and return the number of frames processed
    pub fn apply(&mut self, samples: &mut [i16], channels: u16, volume: f32) -> usize {
        let channels = channels.max(1) as usize;
        let mut frames = 0;

        for frame in samples.chunks_mut(channels) {
            let mut gain = self.gain_at(self.frames_played, volume) as f64;
            if let Some(fade) = self.fade_out.as_mut() {
                gain *= fade.factor();
                fade.elapsed = fade.elapsed.saturating_add(1);
            }

            for sample in frame.iter_mut() {
                *sample = scale_sample(*sample, gain as f32);
            }

            self.frames_played += 1;
            frames += 1;
        }

        frames
    }

    /// Same as [`apply`](Self::apply) for 16-bit little-endian encoded PCM
    pub fn apply_le_bytes(&mut self, bytes: &mut [u8], channels: u16, volume: f32) -> usize {
        let mut samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let frames = self.apply(&mut samples, channels, volume);

        for (pair, sample) in bytes.chunks_exact_mut(2).zip(samples) {
            pair.copy_from_slice(&sample.to_le_bytes());
        }
        frames
    }
}
