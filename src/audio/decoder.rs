use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use crate::audio::AudioDecoder;
use crate::error::DecodeError;

/// Corrupt packets tolerated in a row before the stream is declared broken
const MAX_CONSECUTIVE_DECODE_ERRORS: usize = 8;

/// Decoder for every container and codec symphonia was built with,
/// producing interleaved i16 frames at the file's native rate.
pub struct SymphoniaDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    duration: Option<Duration>,
    sample_rate: u32,
    channels: u16,
    sample_buf: Option<SampleBuffer<i16>>,
    pending: VecDeque<i16>,
    /// Frames to discard after an inexact seek
    skip_frames: u64,
    finished: bool,
}

impl SymphoniaDecoder {
    /// Open `path` and decode the first packet so broken files fail here
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DecodeError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            },
            _ => DecodeError::DecodeFailed(format!("Failed to open file: {}", e)),
        })?;

        let media_source = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext_str);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("{} ({})", hint_name(path), e),
            })?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::UnsupportedFormat {
                format: format!("{} (no audio track)", hint_name(path)),
            })?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("{} ({})", hint_name(path), e),
            })?;

        let duration = codec_params.time_base.zip(codec_params.n_frames).map(|(time_base, n_frames)| {
            let time = time_base.calc_time(n_frames);
            Duration::from_secs_f64(time.seconds as f64 + time.frac)
        });

        let mut decoder = SymphoniaDecoder {
            format_reader,
            decoder,
            track_id,
            time_base: codec_params.time_base,
            duration,
            sample_rate: codec_params.sample_rate.unwrap_or(0),
            channels: codec_params.channels.map(|c| c.count() as u16).unwrap_or(0),
            sample_buf: None,
            pending: VecDeque::new(),
            skip_frames: 0,
            finished: false,
        };

        if !decoder.decode_packet()? {
            decoder.finished = true;
        }

        if decoder.sample_rate == 0 || decoder.channels == 0 {
            return Err(DecodeError::CorruptedFile(format!(
                "{}: cannot determine sample rate or channel layout",
                path.display()
            )));
        }

        debug!(
            "Opened {}: {} Hz, {} channel(s), duration {:?}",
            path.display(),
            decoder.sample_rate,
            decoder.channels,
            decoder.duration
        );

        Ok(decoder)
    }

    /// Decode the next packet of our track into `pending`. Returns false at end of stream.
    fn decode_packet(&mut self) -> Result<bool, DecodeError> {
        let mut decode_errors = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(false),
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to read packet: {}", err)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(audio_buf) => {
                    let spec = *audio_buf.spec();
                    self.sample_rate = spec.rate;
                    self.channels = spec.channels.count() as u16;

                    let needed = audio_buf.capacity() * spec.channels.count();
                    let reuse = matches!(&self.sample_buf, Some(buf) if buf.capacity() >= needed);
                    if !reuse {
                        self.sample_buf = Some(SampleBuffer::new(audio_buf.capacity() as u64, spec));
                    }

                    if let Some(buf) = self.sample_buf.as_mut() {
                        buf.copy_interleaved_ref(audio_buf);
                        let channels = self.channels.max(1) as usize;
                        let skip = (self.skip_frames as usize * channels).min(buf.samples().len());
                        self.skip_frames -= (skip / channels) as u64;
                        self.pending.extend(&buf.samples()[skip..]);
                    }
                    return Ok(true);
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    decode_errors += 1;
                    if decode_errors > MAX_CONSECUTIVE_DECODE_ERRORS {
                        return Err(DecodeError::CorruptedFile(msg.to_string()));
                    }
                    warn!("Skipping undecodable packet: {}", msg);
                }
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to decode packet: {}", err)));
                }
            }
        }
    }

    fn timestamp_to_frames(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(time_base) => {
                let time = time_base.calc_time(ts);
                ((time.seconds as f64 + time.frac) * self.sample_rate as f64).round() as u64
            }
            None => ts,
        }
    }
}

fn hint_name(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

impl AudioDecoder for SymphoniaDecoder {
    fn read_frames(&mut self, max_frames: usize) -> Result<Option<Vec<i16>>, DecodeError> {
        let channels = self.channels.max(1) as usize;
        let wanted = max_frames.max(1) * channels;

        while self.pending.len() < wanted && !self.finished {
            if !self.decode_packet()? {
                self.finished = true;
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let available = self.pending.len() - self.pending.len() % channels;
        let take = wanted.min(available).max(self.pending.len().min(channels));
        Ok(Some(self.pending.drain(..take).collect()))
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecodeError> {
        if self.sample_rate == 0 {
            return Err(DecodeError::SeekError("unknown sample rate".to_string()));
        }
        let secs = frame / self.sample_rate as u64;
        let frac = (frame % self.sample_rate as u64) as f64 / self.sample_rate as f64;

        let seeked = self.format_reader
            .seek(SeekMode::Accurate, SeekTo::Time { time: Time::new(secs, frac), track_id: Some(self.track_id) })
            .map_err(|e| DecodeError::SeekError(format!("Seek failed: {}", e)))?;

        // Reset the decoder state after seeking
        self.decoder.reset();
        self.pending.clear();
        self.finished = false;
        self.skip_frames = self.timestamp_to_frames(seeked.required_ts.saturating_sub(seeked.actual_ts));

        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}
