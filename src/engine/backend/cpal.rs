//! CPAL-based audio backend for desktop platforms (Linux, macOS, Windows)
//!
//! Input streams write into a [`StreamTap`] from the device callback. A
//! `cpal::Stream` is not `Send` on every platform, so each input stream is
//! built and owned by a dedicated thread that lives until `stop_tracks`.
//! Desktop hosts have no suspended engine state: the engine always reports
//! running.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::format::RecordingFormat;
use crate::audio::tap::StreamTap;
use crate::error::{CaptureError, PlaybackError};

use super::{AudioBackend, EngineState, InputConstraints, InputStream, SystemTimeSource, TimeSource};

const FALLBACK_SAMPLE_RATE: u32 = 48_000;
const STREAM_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// CPAL backend on the default host's default devices
pub struct CpalBackend {
    clock: Arc<dyn TimeSource>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemTimeSource::default()),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn engine_state(&self) -> EngineState {
        EngineState::Running
    }

    fn resume(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        cpal::default_host()
            .default_input_device()
            .and_then(|device| device.default_input_config().ok())
            .map(|config| config.sample_rate().0)
            .unwrap_or(FALLBACK_SAMPLE_RATE)
    }

    fn open_input(
        &self,
        constraints: &InputConstraints,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        if !(constraints.echo_cancellation
            && constraints.noise_suppression
            && constraints.auto_gain_control)
        {
            log::debug!("[Capture] Input processing flags are advisory on this backend");
        }
        let stream = CpalInputStream::open()?;
        Ok(Box::new(stream))
    }

    fn supports_format(&self, _format: &RecordingFormat) -> bool {
        // Encoding happens in the finalizer, not on the device
        true
    }

    fn clock(&self) -> Arc<dyn TimeSource> {
        Arc::clone(&self.clock)
    }

    fn play(&self, samples: &[f32], sample_rate: u32, gain: f32) -> Result<(), PlaybackError> {
        play_blocking(samples, sample_rate, gain)
    }
}

struct CpalInputStream {
    tap: Arc<StreamTap>,
    sample_rate: u32,
    live: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CpalInputStream {
    fn open() -> Result<Self, CaptureError> {
        let tap = Arc::new(StreamTap::new());
        let live = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_tap = Arc::clone(&tap);
        let thread_live = Arc::clone(&live);
        let handle = thread::Builder::new()
            .name("cpal-input".to_string())
            .spawn(move || {
                let stream = match build_input_stream(Arc::clone(&thread_tap), Arc::clone(&thread_live)) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                // Park until stop_tracks or the owner goes away
                let _ = stop_rx.recv();
                drop(stream);
                thread_live.store(false, Ordering::SeqCst);
            })
            .map_err(|e| CaptureError::DeviceError {
                details: format!("failed to spawn input thread: {}", e),
            })?;

        let sample_rate = match ready_rx.recv_timeout(STREAM_READY_TIMEOUT) {
            Ok(Ok(rate)) => rate,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err);
            }
            Err(_) => {
                let _ = stop_tx.send(());
                return Err(CaptureError::DeviceUnavailable {
                    reason: "input stream did not start in time".to_string(),
                });
            }
        };

        log::info!("[Capture] Input stream opened at {} Hz", sample_rate);
        Ok(Self {
            tap,
            sample_rate,
            live,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

impl InputStream for CpalInputStream {
    fn tap(&self) -> Arc<StreamTap> {
        Arc::clone(&self.tap)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst) && self.stop_tx.is_some()
    }

    fn stop_tracks(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.live.store(false, Ordering::SeqCst);
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

fn build_input_stream(
    tap: Arc<StreamTap>,
    live: Arc<AtomicBool>,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::DeviceNotFound)?;

    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable {
            reason: format!("failed to get default input config: {}", e),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let sample_rate = stream_config.sample_rate.0;
    let channel_count = stream_config.channels as usize;

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_typed_input(&device, &stream_config, channel_count, tap, live, |s: f32| s)
        }
        cpal::SampleFormat::I16 => {
            build_typed_input(&device, &stream_config, channel_count, tap, live, |s: i16| {
                s as f32 / 32_768.0
            })
        }
        cpal::SampleFormat::U16 => {
            build_typed_input(&device, &stream_config, channel_count, tap, live, |s: u16| {
                (s as f32 - 32_768.0) / 32_768.0
            })
        }
        other => {
            return Err(CaptureError::UnsupportedSampleFormat {
                format: format!("{:?}", other),
            })
        }
    }?;

    stream.play().map_err(|e| CaptureError::DeviceError {
        details: format!("input start failed: {}", e),
    })?;

    Ok((stream, sample_rate))
}

fn build_typed_input<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channel_count: usize,
    tap: Arc<StreamTap>,
    live: Arc<AtomicBool>,
    convert: F,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample + Send + 'static,
    F: Fn(T) -> f32 + Send + 'static,
{
    let error_tap = Arc::clone(&tap);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                tap.write_interleaved(data, channel_count, &convert);
            },
            move |err| {
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    live.store(false, Ordering::SeqCst);
                }
                error_tap.report_error(&err.to_string());
            },
            None,
        )
        .map_err(map_build_error)
}

fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceNotFound,
        cpal::BuildStreamError::StreamConfigNotSupported => CaptureError::DeviceUnavailable {
            reason: "stream configuration not supported".to_string(),
        },
        other => CaptureError::DeviceError {
            details: other.to_string(),
        },
    }
}

/// Play mono samples on the default output device and wait for the end
fn play_blocking(samples: &[f32], source_rate: u32, gain: f32) -> Result<(), PlaybackError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlaybackError::OutputUnavailable {
            reason: "no default output device found".to_string(),
        })?;
    let config = device
        .default_output_config()
        .map_err(|e| PlaybackError::OutputUnavailable {
            reason: format!("failed to get default output config: {}", e),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let output_rate = stream_config.sample_rate.0.max(1);
    let channel_count = (stream_config.channels as usize).max(1);

    // Nearest-sample rate conversion is enough for review playback
    let ratio = source_rate.max(1) as f64 / output_rate as f64;
    let output_frames = (samples.len() as f64 / ratio).ceil() as usize;
    let source: Arc<Vec<f32>> = Arc::new(
        (0..output_frames)
            .map(|i| {
                let index = ((i as f64 * ratio) as usize).min(samples.len().saturating_sub(1));
                samples.get(index).copied().unwrap_or(0.0) * gain
            })
            .collect(),
    );

    let position = Arc::new(AtomicUsize::new(0));
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_typed_output(
            &device,
            &stream_config,
            channel_count,
            Arc::clone(&source),
            Arc::clone(&position),
            Arc::clone(&failure),
            |s| s,
        ),
        cpal::SampleFormat::I16 => build_typed_output(
            &device,
            &stream_config,
            channel_count,
            Arc::clone(&source),
            Arc::clone(&position),
            Arc::clone(&failure),
            |s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16,
        ),
        other => {
            return Err(PlaybackError::OutputUnavailable {
                reason: format!("output sample format {:?} is not supported", other),
            })
        }
    }?;

    stream.play().map_err(|e| PlaybackError::StreamFailed {
        reason: format!("output start failed: {}", e),
    })?;

    let expected = Duration::from_secs_f64(output_frames as f64 / output_rate as f64);
    let deadline = Instant::now() + expected + Duration::from_secs(2);
    loop {
        if let Some(reason) = failure.lock().ok().and_then(|mut slot| slot.take()) {
            return Err(PlaybackError::StreamFailed { reason });
        }
        if position.load(Ordering::SeqCst) >= source.len() {
            break;
        }
        if Instant::now() >= deadline {
            return Err(PlaybackError::Interrupted);
        }
        thread::sleep(Duration::from_millis(10));
    }

    // Let the device drain its last buffer
    thread::sleep(Duration::from_millis(50));
    drop(stream);
    Ok(())
}

fn build_typed_output<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channel_count: usize,
    source: Arc<Vec<f32>>,
    position: Arc<AtomicUsize>,
    failure: Arc<Mutex<Option<String>>>,
    convert: F,
) -> Result<cpal::Stream, PlaybackError>
where
    T: cpal::SizedSample + Send + 'static,
    F: Fn(f32) -> T + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut pos = position.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channel_count) {
                    let value = source.get(pos).copied().unwrap_or(0.0);
                    for slot in frame.iter_mut() {
                        *slot = convert(value);
                    }
                    if pos < source.len() {
                        pos += 1;
                    }
                }
                position.store(pos, Ordering::SeqCst);
            },
            move |err| {
                if let Ok(mut slot) = failure.lock() {
                    *slot = Some(err.to_string());
                }
            },
            None,
        )
        .map_err(|e| PlaybackError::OutputUnavailable {
            reason: e.to_string(),
        })
}
