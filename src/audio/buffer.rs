use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bounded, lock-free queue of interleaved i16 samples between the playback
/// thread and the device callback.
///
/// [`SampleQueue::split`] hands out the two ends: the [`SampleWriter`] stays
/// with the session, the [`SampleReader`] moves into the render callback.
pub struct SampleQueue {
    ring: HeapRb<i16>,
    capacity: usize,
    channels: u16,
    sample_rate: u32,
}

/// Write end. Owned by the output on the playback thread.
pub struct SampleWriter {
    producer: HeapProd<i16>,
    flush_mark: Arc<AtomicU64>,
    /// Samples ever pushed
    pushed: u64,
    /// Samples pushed before the most recent flush
    discarded: u64,
    capacity: usize,
    channels: u16,
    sample_rate: u32,
}

/// Read end. Owned by the device callback; never blocks.
pub struct SampleReader {
    consumer: HeapCons<i16>,
    flush_mark: Arc<AtomicU64>,
    /// Samples ever popped, rendered or discarded
    popped: u64,
}

impl SampleQueue {
    /// Create a queue holding at most `capacity_frames` frames
    pub fn new(capacity_frames: usize, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let capacity = capacity_frames.max(1).saturating_mul(channels as usize);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            channels,
            sample_rate,
        }
    }

    pub fn split(self) -> (SampleWriter, SampleReader) {
        let (producer, consumer) = self.ring.split();
        let flush_mark = Arc::new(AtomicU64::new(0));

        let writer = SampleWriter {
            producer,
            flush_mark: Arc::clone(&flush_mark),
            pushed: 0,
            discarded: 0,
            capacity: self.capacity,
            channels: self.channels,
            sample_rate: self.sample_rate,
        };
        let reader = SampleReader {
            consumer,
            flush_mark,
            popped: 0,
        };
        (writer, reader)
    }
}

impl SampleWriter {
    /// Total capacity in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples waiting to be rendered, not counting flushed ones the reader has yet to drop
    pub fn available_read(&self) -> usize {
        let live = (self.pushed - self.discarded) as usize;
        self.producer.occupied_len().min(live)
    }

    /// Free space in samples
    pub fn available_write(&self) -> usize {
        self.producer.vacant_len()
    }

    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    /// Append as many samples as fit and return how many were taken
    pub fn push(&mut self, data: &[i16]) -> usize {
        let written = self.producer.push_slice(data);
        self.pushed += written as u64;
        written
    }

    /// Drop everything queued so far. The reader discards it on its next fill,
    /// samples pushed after this call are kept.
    pub fn flush(&mut self) {
        self.discarded = self.pushed;
        self.flush_mark.store(self.pushed, Ordering::Release);
    }

    /// Fraction of capacity in use (0.0 - 1.0)
    pub fn fill_level(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }

    /// Playback time represented by the queued samples
    pub fn buffered_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.available_read() / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

impl SampleReader {
    /// Fill `out` from the queue, padding with silence when it runs dry.
    /// Returns the number of queued samples rendered.
    pub fn fill<T>(&mut self, out: &mut [T]) -> usize
    where
        T: cpal::Sample + cpal::FromSample<i16>,
    {
        let flush_mark = self.flush_mark.load(Ordering::Acquire);
        while self.popped < flush_mark {
            if self.consumer.try_pop().is_none() {
                break;
            }
            self.popped += 1;
        }

        let mut rendered = 0;
        for slot in out.iter_mut() {
            *slot = match self.consumer.try_pop() {
                Some(sample) => {
                    rendered += 1;
                    T::from_sample(sample)
                }
                None => T::EQUILIBRIUM,
            };
        }
        self.popped += rendered as u64;
        rendered
    }
}
