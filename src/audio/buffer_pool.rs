// BufferPool - lock-free block pool with dual SPSC queues
//
// Moves captured sample blocks from the device callback to the recorder worker
// without allocating on the device thread.
//
// Architecture:
// - DATA_QUEUE: device callback pushes filled blocks, recorder consumes
// - POOL_QUEUE: recorder returns drained blocks, device callback recycles
//
// A fresh pool is built for every recording attempt; the device side is
// attached to the stream tap and the recorder side is moved into the worker.

use rtrb::{Consumer, Producer};

use crate::error::CaptureError;

/// Configuration constants for buffer pool
pub const DEFAULT_BUFFER_COUNT: usize = 64;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Audio block type - pre-allocated vector of mono f32 samples
pub type AudioBuffer = Vec<f32>;

/// Device-side half: written from the hardware callback
pub struct DeviceChannels {
    /// Producer for sending filled blocks to the recorder
    pub data_producer: Producer<AudioBuffer>,
    /// Consumer for retrieving empty blocks
    pub pool_consumer: Consumer<AudioBuffer>,
    /// Samples per block
    pub block_size: usize,
    /// Block the data queue refused; reused before the pool is touched again
    pub spare: Option<AudioBuffer>,
}

/// Recorder-side half: owned by the recorder worker thread
pub struct RecorderChannels {
    /// Consumer for receiving filled blocks
    pub data_consumer: Consumer<AudioBuffer>,
    /// Producer for returning drained blocks
    pub pool_producer: Producer<AudioBuffer>,
}

/// All four queue ends, as returned by [`BufferPool::new`]
pub struct BufferPoolChannels {
    pub block_size: usize,
    pub data_producer: Producer<AudioBuffer>,
    pub data_consumer: Consumer<AudioBuffer>,
    pub pool_producer: Producer<AudioBuffer>,
    pub pool_consumer: Consumer<AudioBuffer>,
}

impl BufferPoolChannels {
    /// Split into the device half and the recorder half
    pub fn split(self) -> (DeviceChannels, RecorderChannels) {
        (
            DeviceChannels {
                data_producer: self.data_producer,
                pool_consumer: self.pool_consumer,
                block_size: self.block_size,
                spare: None,
            },
            RecorderChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
///
/// Pre-allocates a fixed number of blocks and manages them through two
/// lock-free queues, so the only heap allocations happen here.
///
/// # Example
/// ```ignore
/// let (mut device, mut recorder) = BufferPool::new(16, 2048)?.split();
///
/// // In the device callback:
/// if let Ok(mut block) = device.pool_consumer.pop() {
///     block.clear();
///     block.extend_from_slice(input);
///     let _ = device.data_producer.push(block);
/// }
///
/// // In the recorder worker:
/// if let Ok(block) = recorder.data_consumer.pop() {
///     chunk.extend_from_slice(&block);
///     let _ = recorder.pool_producer.push(block);
/// }
/// ```
pub struct BufferPool;

impl BufferPool {
    /// Create a new pool with `buffer_count` blocks of `buffer_size` samples
    ///
    /// # Errors
    /// `RecorderFailed` if either dimension is zero.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> Result<BufferPoolChannels, CaptureError> {
        if buffer_count == 0 || buffer_size == 0 {
            return Err(CaptureError::RecorderFailed {
                reason: format!(
                    "invalid buffer pool dimensions: {} blocks of {} samples",
                    buffer_count, buffer_size
                ),
            });
        }

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        // The pool queue has exactly buffer_count slots, so every push fits
        for _ in 0..buffer_count {
            if pool_producer.push(Vec::with_capacity(buffer_size)).is_err() {
                break;
            }
        }

        Ok(BufferPoolChannels {
            block_size: buffer_size,
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_creation() {
        let mut channels = BufferPool::new(16, 2048).unwrap();

        let mut available_buffers = 0;
        while channels.pool_consumer.pop().is_ok() {
            available_buffers += 1;
        }
        assert_eq!(available_buffers, 16, "Expected 16 buffers in pool queue");

        assert!(
            channels.data_consumer.pop().is_err(),
            "Data queue should be empty initially"
        );
    }

    #[test]
    fn test_buffer_capacity() {
        let mut channels = BufferPool::new(1, 512).unwrap();
        let buffer = channels.pool_consumer.pop().unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 512);
    }

    #[test]
    fn test_split_circulation() {
        let (mut device, mut recorder) = BufferPool::new(2, 256).unwrap().split();

        let mut block = device.pool_consumer.pop().unwrap();
        block.extend_from_slice(&[0.25, -0.25]);
        device.data_producer.push(block).unwrap();

        let block = recorder.data_consumer.pop().unwrap();
        assert_eq!(block, vec![0.25, -0.25]);
        recorder.pool_producer.push(block).unwrap();

        // Both blocks are back in the pool
        assert!(device.pool_consumer.pop().is_ok());
        assert!(device.pool_consumer.pop().is_ok());
        assert!(device.pool_consumer.pop().is_err());
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DeviceChannels>();
        assert_send::<RecorderChannels>();
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(BufferPool::new(0, 1024).is_err());
        assert!(BufferPool::new(16, 0).is_err());
    }
}
