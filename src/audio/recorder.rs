// Recorder - per-attempt worker collecting captured blocks into chunks
//
// One recorder exists per recording attempt. Its worker thread drains the
// recorder half of a fresh buffer pool, feeds every block to the analyser
// node, and seals the samples gathered during each chunk interval into one
// chunk. Empty intervals produce no chunk.
//
// Stopping detaches the device side from the stream tap first, then drains
// whatever is still queued, so the last partial interval is never lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::analyser_node::AnalyserNode;
use super::buffer_pool::RecorderChannels;
use super::tap::{Attachment, StreamTap};
use crate::error::CaptureError;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Everything the worker produced
#[derive(Debug, Default)]
pub struct RecorderOutput {
    /// Sealed chunks in capture order, never empty
    pub chunks: Vec<Vec<f32>>,
    /// Stream failure reported while recording
    pub error: Option<String>,
}

impl RecorderOutput {
    pub fn total_samples(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

pub struct Recorder {
    stop_flag: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    handle: Option<JoinHandle<RecorderOutput>>,
}

impl Recorder {
    /// Spawn the worker
    ///
    /// `attachment` names the device half attached for this attempt; the
    /// worker only ever detaches that one.
    pub fn start(
        mut channels: RecorderChannels,
        tap: Arc<StreamTap>,
        attachment: Attachment,
        node: Arc<AnalyserNode>,
        chunk_interval: Duration,
    ) -> Result<Self, CaptureError> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_flag);
        let failed_flag = Arc::clone(&failed);

        let handle = thread::Builder::new()
            .name("recorder".to_string())
            .spawn(move || {
                let mut output = RecorderOutput::default();
                let mut current: Vec<f32> = Vec::new();
                let mut last_seal = Instant::now();

                loop {
                    let stopping = stop.load(Ordering::SeqCst);
                    if stopping {
                        // No more device writes after this point
                        tap.detach_attachment(attachment);
                    }

                    while let Ok(block) = channels.data_consumer.pop() {
                        node.push_samples(&block);
                        current.extend_from_slice(&block);
                        let _ = channels.pool_producer.push(block);
                    }

                    if let Some(err) = tap.take_error() {
                        log::error!("[Capture] Input stream reported an error: {}", err);
                        output.error = Some(err);
                        failed_flag.store(true, Ordering::SeqCst);
                        tap.detach_attachment(attachment);
                        break;
                    }

                    if stopping {
                        break;
                    }

                    if last_seal.elapsed() >= chunk_interval {
                        if !current.is_empty() {
                            output.chunks.push(std::mem::take(&mut current));
                        }
                        last_seal = Instant::now();
                    }

                    thread::sleep(POLL_INTERVAL);
                }

                if !current.is_empty() {
                    output.chunks.push(current);
                }
                output
            })
            .map_err(|e| CaptureError::RecorderFailed {
                reason: format!("failed to spawn recorder worker: {}", e),
            })?;

        Ok(Self {
            stop_flag,
            failed,
            handle: Some(handle),
        })
    }

    /// True once the worker exited because the stream failed
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Stop the worker and collect its chunks; blocks until drained
    pub fn stop(mut self) -> Result<RecorderOutput, CaptureError> {
        self.join()
    }

    fn join(&mut self) -> Result<RecorderOutput, CaptureError> {
        self.stop_flag.store(true, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| CaptureError::RecorderFailed {
                reason: "recorder worker panicked".to_string(),
            }),
            None => Ok(RecorderOutput::default()),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Discarded without stop(): release the worker and its chunks
        let _ = self.join();
    }
}
