// Live analysis loop
//
// While recording, reads one frequency and one time-domain snapshot from the
// analyser node per display frame, appends a VolumeSample and a
// WaveformSample to the session series, and publishes a LiveSample for
// visualisation. Publishing uses `broadcast::Sender::send`, which never
// blocks: lagging subscribers lose old samples instead of slowing capture.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use super::analyser_node::AnalyserNode;
use crate::config::CaptureConfig;
use crate::engine::backend::TimeSource;

/// Volume reading at one frame tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeSample {
    /// Seconds since recording start
    pub time: f32,
    /// 0..=100
    pub volume: u8,
}

/// Mean absolute deviation of the time-domain snapshot from its midpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveformSample {
    pub time: f32,
    pub value: f32,
}

/// Notification published for live visualisation
#[derive(Debug, Clone)]
pub struct LiveSample {
    pub volume: u8,
    pub frequency_data: Vec<u8>,
    pub time_domain_data: Vec<u8>,
}

/// Series collected during one recording attempt
#[derive(Debug, Clone, Default)]
pub struct LiveSeries {
    pub volume: Vec<VolumeSample>,
    pub waveform: Vec<WaveformSample>,
}

impl LiveSeries {
    pub fn clear(&mut self) {
        self.volume.clear();
        self.waveform.clear();
    }
}

/// Map the mean frequency byte onto the 0-100 volume scale
pub fn volume_from_frequency(frequency_data: &[u8], scale: f32, offset: f32) -> u8 {
    if frequency_data.is_empty() {
        return 0;
    }
    let sum: u32 = frequency_data.iter().map(|&b| b as u32).sum();
    let average = sum as f32 / frequency_data.len() as f32;
    ((average / 255.0) * scale + offset).round().clamp(0.0, 100.0) as u8
}

/// Mean absolute deviation of time-domain bytes from 128
pub fn waveform_deviation(time_domain_data: &[u8]) -> f32 {
    if time_domain_data.is_empty() {
        return 0.0;
    }
    let sum: u32 = time_domain_data
        .iter()
        .map(|&b| (b as i32 - 128).unsigned_abs())
        .sum();
    sum as f32 / time_domain_data.len() as f32
}

/// Everything a loop needs; built fresh for every recording attempt
pub struct LiveLoopContext {
    pub node: Arc<AnalyserNode>,
    pub recording: Arc<AtomicBool>,
    pub series: Arc<Mutex<LiveSeries>>,
    pub publisher: Option<broadcast::Sender<LiveSample>>,
    pub clock: Arc<dyn TimeSource>,
    pub started_at: Instant,
}

/// Handle to the running loop thread
pub struct LiveAnalysisLoop {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LiveAnalysisLoop {
    /// Spawn the loop; it runs until cancelled, until recording stops, or
    /// until the analyser node is disconnected
    pub fn start(ctx: LiveLoopContext, config: &CaptureConfig) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_flag = Arc::clone(&cancelled);
        let frame_interval = Duration::from_millis(config.frame_interval_ms.max(1));
        let scale = config.volume_scale;
        let offset = config.volume_offset;

        let handle = thread::Builder::new()
            .name("live-analysis".to_string())
            .spawn(move || {
                let mut frequency = vec![0u8; ctx.node.frequency_bin_count()];
                let mut time_domain = vec![0u8; ctx.node.fft_size()];

                loop {
                    if cancelled_flag.load(Ordering::SeqCst)
                        || !ctx.recording.load(Ordering::SeqCst)
                        || !ctx.node.is_connected()
                    {
                        break;
                    }

                    ctx.node.byte_frequency_data(&mut frequency);
                    ctx.node.byte_time_domain_data(&mut time_domain);

                    let volume = volume_from_frequency(&frequency, scale, offset);
                    let deviation = waveform_deviation(&time_domain);
                    let time = ctx
                        .clock
                        .now()
                        .saturating_duration_since(ctx.started_at)
                        .as_secs_f32();

                    {
                        let mut series = match ctx.series.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        // Checked under the series lock so a cleared series stays clear
                        if cancelled_flag.load(Ordering::SeqCst) {
                            break;
                        }
                        series.volume.push(VolumeSample { time, volume });
                        series.waveform.push(WaveformSample {
                            time,
                            value: deviation,
                        });
                    }

                    if let Some(tx) = &ctx.publisher {
                        // No receivers is fine
                        let _ = tx.send(LiveSample {
                            volume,
                            frequency_data: frequency.clone(),
                            time_domain_data: time_domain.clone(),
                        });
                    }

                    thread::sleep(frame_interval);
                }
                log::debug!("[Capture] Live analysis loop finished");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("[Capture] Failed to spawn live analysis loop: {}", err);
                None
            }
        };

        Self { cancelled, handle }
    }

    /// Ask the loop to stop without waiting for it
    ///
    /// No sample is appended to the series after this returns, but the
    /// thread may still be running; [`cancel`](Self::cancel) joins it.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for it
    ///
    /// Once this returns, no further samples are appended.
    pub fn cancel(&mut self) {
        self.request_cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("[Capture] Live analysis loop panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for LiveAnalysisLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}
