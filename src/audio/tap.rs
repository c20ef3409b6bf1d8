// StreamTap - device-side attachment point for the recorder
//
// The hardware stream owns one tap for its whole lifetime. Each recording
// attempt attaches a fresh set of device channels and detaches them on stop,
// so a live stream can be reused across attempts.
//
// The device callback only ever uses `try_lock`: if the recorder is in the
// middle of attaching or detaching, the block is dropped instead of waiting.

use rtrb::PushError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::buffer_pool::DeviceChannels;
use crate::error::CaptureError;

/// Identifies one [`StreamTap::attach`] call
///
/// A recorder detaches through its own attachment, so a late stop can never
/// pull the channels of a newer attempt off a shared stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment(u64);

pub struct StreamTap {
    channels: Mutex<Option<DeviceChannels>>,
    /// Id of the attached channels; only changed under the channels lock
    attachment: AtomicU64,
    error: Mutex<Option<String>>,
    has_error: AtomicBool,
    dropped_blocks: AtomicU64,
}

impl StreamTap {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(None),
            attachment: AtomicU64::new(0),
            error: Mutex::new(None),
            has_error: AtomicBool::new(false),
            dropped_blocks: AtomicU64::new(0),
        }
    }

    /// Attach the device half of a fresh buffer pool
    ///
    /// Replaces any previously attached channels and clears a stale error.
    pub fn attach(&self, channels: DeviceChannels) -> Result<Attachment, CaptureError> {
        let mut guard = self.lock_channels()?;
        *guard = Some(channels);
        let id = self.attachment.fetch_add(1, Ordering::SeqCst) + 1;
        drop(guard);
        self.clear_error();
        Ok(Attachment(id))
    }

    /// Detach only if `attachment` is still the attached set of channels
    pub fn detach_attachment(&self, attachment: Attachment) -> Option<DeviceChannels> {
        let mut guard = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.attachment.load(Ordering::SeqCst) != attachment.0 {
            return None;
        }
        guard.take()
    }

    /// Detach the device channels; the callback stops delivering afterwards
    pub fn detach(&self) -> Option<DeviceChannels> {
        match self.channels.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn is_attached(&self) -> bool {
        match self.channels.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// Deliver interleaved frames from the device callback
    ///
    /// Only the first channel is kept. Data larger than one block is split
    /// across several blocks. Never blocks and never allocates.
    pub fn write_interleaved<T, F>(&self, data: &[T], channel_count: usize, convert: F)
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let channel_count = channel_count.max(1);
        let mut guard = match self.channels.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        let Some(channels) = guard.as_mut() else {
            return;
        };

        let block_size = channels.block_size.max(1);
        let mut frames = data.chunks(channel_count).peekable();
        while frames.peek().is_some() {
            let Some(mut block) = channels
                .spare
                .take()
                .or_else(|| channels.pool_consumer.pop().ok())
            else {
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
                return;
            };
            block.clear();
            while block.len() < block_size {
                match frames.next() {
                    Some(frame) => block.push(frame.first().map(|&s| convert(s)).unwrap_or(0.0)),
                    None => break,
                }
            }
            if let Err(PushError::Full(block)) = channels.data_producer.push(block) {
                // Samples are lost but the block stays in circulation
                channels.spare = Some(block);
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }

    /// Deliver mono f32 samples
    pub fn write(&self, samples: &[f32]) {
        self.write_interleaved(samples, 1, |s| s);
    }

    /// Record a stream failure reported by the device
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        match self.error.lock() {
            Ok(mut guard) => *guard = Some(message),
            Err(poisoned) => *poisoned.into_inner() = Some(message),
        }
        self.has_error.store(true, Ordering::SeqCst);
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    /// Take the pending stream failure, if any
    pub fn take_error(&self) -> Option<String> {
        if !self.has_error.swap(false, Ordering::SeqCst) {
            return None;
        }
        match self.error.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Blocks dropped because the pool was exhausted or the tap was busy
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }

    fn clear_error(&self) {
        let _ = self.take_error();
    }

    fn lock_channels(&self) -> Result<MutexGuard<'_, Option<DeviceChannels>>, CaptureError> {
        self.channels.lock().map_err(|_| CaptureError::LockPoisoned {
            component: "stream tap".to_string(),
        })
    }
}

impl Default for StreamTap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer_pool::BufferPool;

    #[test]
    fn test_detached_tap_discards_samples() {
        let tap = StreamTap::new();
        tap.write(&[0.5; 64]);
        assert!(!tap.is_attached());
        assert_eq!(tap.dropped_blocks(), 0);
    }

    #[test]
    fn test_write_splits_into_blocks_and_keeps_first_channel() {
        let tap = StreamTap::new();
        let (device, mut recorder) = BufferPool::new(4, 3).unwrap().split();
        tap.attach(device).unwrap();

        // Stereo frames: left = index, right = -1
        let interleaved: Vec<f32> = (0..5).flat_map(|i| [i as f32, -1.0]).collect();
        tap.write_interleaved(&interleaved, 2, |s| s);

        let first = recorder.data_consumer.pop().unwrap();
        let second = recorder.data_consumer.pop().unwrap();
        assert_eq!(first, vec![0.0, 1.0, 2.0]);
        assert_eq!(second, vec![3.0, 4.0]);
    }

    #[test]
    fn test_i16_conversion() {
        let tap = StreamTap::new();
        let (device, mut recorder) = BufferPool::new(1, 8).unwrap().split();
        tap.attach(device).unwrap();

        tap.write_interleaved(&[i16::MAX, 0], 1, |s| s as f32 / 32768.0);
        let block = recorder.data_consumer.pop().unwrap();
        assert!((block[0] - 0.99997).abs() < 1e-4);
        assert_eq!(block[1], 0.0);
    }

    #[test]
    fn test_exhausted_pool_counts_drops() {
        let tap = StreamTap::new();
        let (device, _recorder) = BufferPool::new(1, 2).unwrap().split();
        tap.attach(device).unwrap();

        tap.write(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(tap.dropped_blocks(), 1);
    }

    #[test]
    fn test_full_data_queue_keeps_block_in_circulation() {
        let tap = StreamTap::new();
        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(3);
        for _ in 0..3 {
            pool_producer.push(Vec::with_capacity(2)).unwrap();
        }
        let (data_producer, mut data_consumer) = rtrb::RingBuffer::new(1);
        tap.attach(DeviceChannels {
            data_producer,
            pool_consumer,
            block_size: 2,
            spare: None,
        })
        .unwrap();

        tap.write(&[0.1, 0.2]);
        tap.write(&[0.3, 0.4]);
        assert_eq!(tap.dropped_blocks(), 1);

        assert_eq!(data_consumer.pop().unwrap(), vec![0.1, 0.2]);
        tap.write(&[0.5, 0.6]);
        assert_eq!(data_consumer.pop().unwrap(), vec![0.5, 0.6]);
        assert_eq!(tap.dropped_blocks(), 1);

        // The refused block was reused, so one pool block is still untouched
        let mut device = tap.detach().unwrap();
        assert!(device.spare.is_none());
        assert!(device.pool_consumer.pop().is_ok());
        assert!(device.pool_consumer.pop().is_err());
    }

    #[test]
    fn test_stale_attachment_does_not_detach_newer_channels() {
        let tap = StreamTap::new();
        let (first, _first_recorder) = BufferPool::new(2, 4).unwrap().split();
        let old = tap.attach(first).unwrap();
        let (second, mut second_recorder) = BufferPool::new(2, 4).unwrap().split();
        let current = tap.attach(second).unwrap();
        assert_ne!(old, current);

        assert!(tap.detach_attachment(old).is_none());
        tap.write(&[0.5; 4]);
        assert_eq!(second_recorder.data_consumer.pop().unwrap(), vec![0.5; 4]);

        assert!(tap.detach_attachment(current).is_some());
        assert!(!tap.is_attached());
    }

    #[test]
    fn test_error_is_taken_once() {
        let tap = StreamTap::new();
        tap.report_error("device unplugged");
        assert!(tap.has_error());
        assert_eq!(tap.take_error().as_deref(), Some("device unplugged"));
        assert!(tap.take_error().is_none());
    }
}
