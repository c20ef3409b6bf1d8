// Audio module - capture data path, live analysis, finalization and playback

pub mod analyser_node;
pub mod buffer_pool;
pub mod finalizer;
pub mod format;
pub mod live;
pub mod playback;
pub mod recorder;
pub mod tap;

// Re-export commonly used types for convenience
pub use buffer_pool::{
    AudioBuffer, BufferPool, BufferPoolChannels, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE,
};
pub use finalizer::{DecodedBuffer, RecordedAudio};
pub use format::RecordingFormat;
pub use live::{LiveSample, VolumeSample, WaveformSample};
pub use playback::play_recording;
