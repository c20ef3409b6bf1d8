// CaptureController: microphone stream and recorder lifecycle
//
// State machine:
//   idle -> recording -> stopping -> stopped
// Any step may move to error; start_recording from stopped or error begins
// a fresh attempt.
//
// The hardware stream and the recorder are separate resources. The stream
// survives failed attempts (cleanup(false)) so a retry does not reopen the
// device, while the recorder, its buffer pool and its chunks are rebuilt for
// every attempt.

use futures::{Stream, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::audio::analyser_node::AnalyserNode;
use crate::audio::buffer_pool::BufferPool;
use crate::audio::finalizer::{finalize_recording, FinalizeRequest, RecordedAudio};
use crate::audio::format::{negotiate_format, RecordingFormat};
use crate::audio::live::{LiveAnalysisLoop, LiveLoopContext, LiveSample, LiveSeries};
use crate::audio::recorder::Recorder;
use crate::config::CaptureConfig;
use crate::engine::backend::{AudioBackend, EngineState, InputConstraints, InputStream};
use crate::engine::gesture::GestureGate;
use crate::error::{log_capture_error, CaptureError, ErrorCode};
use crate::managers::BroadcastChannelManager;

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Stopping,
    Stopped,
    Error,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Stopping => "stopping",
            RecorderState::Stopped => "stopped",
            RecorderState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Lifecycle notifications published next to the live samples
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    RecordingStarted,
    RecordingStopped { size: usize, duration: f32 },
    RecordingFailed { code: i32, message: String },
    CleanedUp { released_stream: bool },
}

struct CaptureSession {
    state: RecorderState,
    /// Bumped for every attempt; a stop only finishes the attempt it began
    attempt: u64,
    stream: Option<Box<dyn InputStream>>,
    recorder: Option<Recorder>,
    live_loop: Option<LiveAnalysisLoop>,
    format: RecordingFormat,
    sample_rate: u32,
    started_at: Option<Instant>,
}

/// Per-attempt resources taken out of the session
///
/// Joining the live loop and the recorder worker, and stopping the tracks,
/// happens in [`Released::finish`] after the session lock is dropped.
struct Released {
    live_loop: Option<LiveAnalysisLoop>,
    recorder: Option<Recorder>,
    stream: Option<Box<dyn InputStream>>,
}

impl Released {
    fn finish(self) {
        if let Some(mut live_loop) = self.live_loop {
            live_loop.cancel();
        }
        // Dropping the recorder joins its worker and discards its chunks
        drop(self.recorder);
        if let Some(mut stream) = self.stream {
            stream.stop_tracks();
            log::info!("[Capture] Microphone released");
        }
    }
}

/// State shared between the controller and an in-flight stop
///
/// A stop runs to completion on the blocking pool even when the future
/// awaiting it is dropped, so it owns a handle to everything it finishes.
struct CaptureShared {
    session: Mutex<CaptureSession>,
    analyser: Arc<AnalyserNode>,
    series: Arc<Mutex<LiveSeries>>,
    recording: Arc<AtomicBool>,
    channels: BroadcastChannelManager,
}

impl CaptureShared {
    fn lock_session(&self) -> MutexGuard<'_, CaptureSession> {
        lock(&self.session)
    }

    /// Tear down the current attempt under the session lock
    ///
    /// The returned resources must be finished once the lock is released.
    fn cleanup_session(&self, session: &mut CaptureSession, stop_tracks: bool) -> Released {
        self.recording.store(false, Ordering::SeqCst);
        let live_loop = session.live_loop.take();
        if let Some(live_loop) = live_loop.as_ref() {
            live_loop.request_cancel();
        }
        self.analyser.disconnect();

        let recorder = session.recorder.take();
        if let Some(stream) = session.stream.as_ref() {
            stream.tap().detach();
        }
        lock(&self.series).clear();
        session.started_at = None;

        let stream = if stop_tracks {
            session.stream.take()
        } else {
            None
        };

        self.channels
            .publish_capture_event(CaptureEvent::CleanedUp {
                released_stream: stop_tracks,
            });
        Released {
            live_loop,
            recorder,
            stream,
        }
    }

    /// Settle the outcome of a stop that began on `attempt`
    ///
    /// If the attempt was cleaned up or replaced meanwhile, the session is
    /// left alone and the outcome is only handed back to the caller.
    fn finish_stop(
        &self,
        attempt: u64,
        finalized: Result<RecordedAudio, CaptureError>,
    ) -> Result<Option<RecordedAudio>, CaptureError> {
        let mut session = self.lock_session();
        if session.attempt != attempt || session.state != RecorderState::Stopping {
            log::info!(
                "[Capture] Attempt {} was superseded while stopping (now attempt {}, {})",
                attempt,
                session.attempt,
                session.state
            );
            return finalized.map(Some);
        }

        let released = self.cleanup_session(&mut session, true);
        let result = match finalized {
            Ok(recorded) => {
                session.state = RecorderState::Stopped;
                log::info!(
                    "[Capture] Recording stopped ({} bytes, {:.2}s)",
                    recorded.size,
                    recorded.duration
                );
                self.channels
                    .publish_capture_event(CaptureEvent::RecordingStopped {
                        size: recorded.size,
                        duration: recorded.duration,
                    });
                Ok(Some(recorded))
            }
            Err(err) => {
                log_capture_error(&err, "stop_recording");
                session.state = RecorderState::Error;
                self.publish_failure(&err);
                Err(err)
            }
        };
        drop(session);
        released.finish();
        result
    }

    fn publish_failure(&self, err: &CaptureError) {
        self.channels
            .publish_capture_event(CaptureEvent::RecordingFailed {
                code: err.code(),
                message: err.message(),
            });
    }
}

impl Drop for CaptureShared {
    fn drop(&mut self) {
        let session = match self.session.get_mut() {
            Ok(session) => session,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.recording.store(false, Ordering::SeqCst);
        Released {
            live_loop: session.live_loop.take(),
            recorder: session.recorder.take(),
            stream: session.stream.take(),
        }
        .finish();
    }
}

/// Owns the exclusive capture lifecycle of one microphone
///
/// All methods take `&self`; share the controller behind an `Arc` when a
/// timer or another task needs to stop the recording.
pub struct CaptureController {
    backend: Arc<dyn AudioBackend>,
    config: CaptureConfig,
    shared: Arc<CaptureShared>,
    gesture: GestureGate,
}

impl CaptureController {
    pub fn new(backend: Arc<dyn AudioBackend>, config: CaptureConfig) -> Self {
        let channels = BroadcastChannelManager::new();
        channels.init_live_samples();
        channels.init_capture_events();

        let shared = CaptureShared {
            session: Mutex::new(CaptureSession {
                state: RecorderState::Idle,
                attempt: 0,
                stream: None,
                recorder: None,
                live_loop: None,
                format: crate::audio::format::DEFAULT_FORMAT,
                sample_rate: backend.sample_rate(),
                started_at: None,
            }),
            analyser: Arc::new(AnalyserNode::new(&config)),
            series: Arc::new(Mutex::new(LiveSeries::default())),
            recording: Arc::new(AtomicBool::new(false)),
            channels,
        };

        Self {
            backend,
            config,
            shared: Arc::new(shared),
            gesture: GestureGate::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.lock_session().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Whether a hardware stream is currently held
    pub fn has_stream(&self) -> bool {
        self.lock_session().stream.is_some()
    }

    /// Seconds since the current recording started, 0 when not recording
    pub fn elapsed_secs(&self) -> f32 {
        let session = self.lock_session();
        match (session.state, session.started_at) {
            (RecorderState::Recording, Some(started_at)) => self
                .backend
                .clock()
                .now()
                .saturating_duration_since(started_at)
                .as_secs_f32(),
            _ => 0.0,
        }
    }

    /// Bring the audio engine to the running state
    ///
    /// A suspended engine is resumed. If that fails the gesture gate is
    /// armed and `NeedsUserGesture` is returned; the next call to
    /// [`notify_user_gesture`](Self::notify_user_gesture) retries once.
    pub fn ensure_engine_running(&self) -> Result<(), CaptureError> {
        if self.backend.engine_state() == EngineState::Suspended {
            if let Err(err) = self.backend.resume() {
                log::warn!("[Capture] Failed to resume audio engine: {}", err);
                self.gesture.arm();
                return Err(CaptureError::NeedsUserGesture);
            }
            log::info!("[Capture] Audio engine resumed");
        }

        let state = self.backend.engine_state();
        if state != EngineState::Running {
            return Err(CaptureError::EngineNotRunning {
                state: state.to_string(),
            });
        }
        Ok(())
    }

    /// Report a user gesture
    ///
    /// Returns `Ok(true)` when a pending resume was retried successfully and
    /// `Ok(false)` when no resume was pending.
    pub fn notify_user_gesture(&self) -> Result<bool, CaptureError> {
        if !self.gesture.take() {
            return Ok(false);
        }
        match self.backend.resume() {
            Ok(()) => {
                log::info!("[Capture] Audio engine resumed after user gesture");
                Ok(true)
            }
            Err(err) => {
                log_capture_error(&err, "notify_user_gesture");
                Err(err)
            }
        }
    }

    pub fn is_waiting_for_gesture(&self) -> bool {
        self.gesture.is_armed()
    }

    /// Ensure the engine runs and open the microphone
    ///
    /// An already open, live stream is kept.
    pub fn request_microphone_access(&self) -> Result<(), CaptureError> {
        let mut session = self.lock_session();
        self.acquire_stream(&mut session).map_err(|err| {
            log_capture_error(&err, "request_microphone_access");
            err
        })
    }

    /// Start a recording attempt
    ///
    /// Silent no-op while already recording. On failure every per-attempt
    /// resource is released and the controller returns to idle; a live
    /// stream is kept for the retry.
    pub fn start_recording(&self) -> Result<(), CaptureError> {
        let mut session = self.lock_session();

        match session.state {
            RecorderState::Recording => {
                log::debug!("[Capture] Already recording, start ignored");
                return Ok(());
            }
            RecorderState::Stopping => {
                return Err(CaptureError::RecorderFailed {
                    reason: "previous recording is still being finalized".to_string(),
                });
            }
            _ => {}
        }

        match self.begin_attempt(&mut session) {
            Ok(()) => {
                session.state = RecorderState::Recording;
                log::info!(
                    "[Capture] Recording started (attempt {}, {}, {} Hz)",
                    session.attempt,
                    session.format,
                    session.sample_rate
                );
                self.shared
                    .channels
                    .publish_capture_event(CaptureEvent::RecordingStarted);
                Ok(())
            }
            Err(err) => {
                log_capture_error(&err, "start_recording");
                let released = self.shared.cleanup_session(&mut session, false);
                session.state = RecorderState::Idle;
                self.shared.publish_failure(&err);
                drop(session);
                released.finish();
                Err(err)
            }
        }
    }

    /// Stop the current attempt and finalize it
    ///
    /// Returns `Ok(None)` when nothing was recording. A zero-byte recording
    /// is returned as a successful artifact with `size == 0`. Once the live
    /// loop has been cancelled no further samples are appended, so the
    /// returned series is complete.
    ///
    /// Finalization and cleanup run on the blocking pool and complete even
    /// if this future is dropped; the controller always leaves `Stopping`.
    pub async fn stop_recording(&self) -> Result<Option<RecordedAudio>, CaptureError> {
        let (attempt, recorder, live_loop, format, sample_rate) = {
            let mut session = self.lock_session();
            if session.state != RecorderState::Recording {
                log::info!("[Capture] Nothing to stop (state {})", session.state);
                return Ok(None);
            }
            let Some(recorder) = session.recorder.take() else {
                log::info!("[Capture] Nothing to stop (no active recorder)");
                session.state = RecorderState::Idle;
                return Ok(None);
            };

            session.state = RecorderState::Stopping;
            self.shared.recording.store(false, Ordering::SeqCst);
            let live_loop = session.live_loop.take();
            if let Some(live_loop) = live_loop.as_ref() {
                live_loop.request_cancel();
            }
            self.shared.analyser.disconnect();
            (
                session.attempt,
                recorder,
                live_loop,
                session.format,
                session.sample_rate,
            )
        };

        let shared = Arc::clone(&self.shared);
        let chunk_interval_ms = self.config.chunk_interval_ms;
        let task_shared = Arc::clone(&shared);
        let task = tokio::task::spawn_blocking(move || {
            let shared = task_shared;
            if let Some(mut live_loop) = live_loop {
                live_loop.cancel();
            }
            let (volume_data, waveform_points) = {
                let series = lock(&shared.series);
                (series.volume.clone(), series.waveform.clone())
            };

            let finalized = recorder.stop().and_then(|output| {
                if let Some(reason) = output.error {
                    return Err(CaptureError::RecorderFailed { reason });
                }
                finalize_recording(FinalizeRequest {
                    chunks: output.chunks,
                    sample_rate,
                    format,
                    volume_data,
                    waveform_points,
                    chunk_interval_ms,
                })
            });
            shared.finish_stop(attempt, finalized)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => shared.finish_stop(
                attempt,
                Err(CaptureError::FinalizeFailed {
                    reason: format!("finalization task failed: {}", e),
                }),
            ),
        }
    }

    /// Check the active recorder for a stream failure
    ///
    /// On failure the attempt is torn down (stream kept), the state moves to
    /// error and the error is returned. Call periodically while recording.
    pub fn poll_recorder_health(&self) -> Option<CaptureError> {
        let mut session = self.lock_session();
        if session.state != RecorderState::Recording {
            return None;
        }
        let stream_lost = session
            .stream
            .as_ref()
            .map(|stream| !stream.is_live())
            .unwrap_or(true);
        let failed = session
            .recorder
            .as_ref()
            .map(Recorder::has_failed)
            .unwrap_or(false);
        if !failed && !stream_lost {
            return None;
        }

        let recorder = session.recorder.take();
        let mut released = self.shared.cleanup_session(&mut session, stream_lost);
        session.state = RecorderState::Error;
        drop(session);

        if let Some(mut live_loop) = released.live_loop.take() {
            live_loop.cancel();
        }
        let reason = match recorder.map(Recorder::stop) {
            Some(Ok(output)) => output
                .error
                .unwrap_or_else(|| "input stream ended".to_string()),
            Some(Err(err)) => err.message(),
            None => "input stream ended".to_string(),
        };
        released.finish();

        let err = CaptureError::RecorderFailed { reason };
        log_capture_error(&err, "recorder");
        self.shared.publish_failure(&err);
        Some(err)
    }

    /// Release per-attempt resources, and the hardware stream if asked
    pub fn cleanup(&self, stop_tracks: bool) {
        let mut session = self.lock_session();
        let released = self.shared.cleanup_session(&mut session, stop_tracks);
        if session.state != RecorderState::Error {
            session.state = RecorderState::Idle;
        }
        drop(session);
        released.finish();
    }

    pub fn subscribe_live_samples(&self) -> Option<broadcast::Receiver<LiveSample>> {
        self.shared.channels.subscribe_live_samples()
    }

    pub fn subscribe_capture_events(&self) -> Option<broadcast::Receiver<CaptureEvent>> {
        self.shared.channels.subscribe_capture_events()
    }

    /// Live samples as a stream; lagged samples are skipped
    pub fn live_sample_stream(&self) -> impl Stream<Item = LiveSample> {
        let receiver = self.shared.channels.init_live_samples().subscribe();
        BroadcastStream::new(receiver).filter_map(|result| async move { result.ok() })
    }

    /// Snapshot of the live series of the current attempt
    pub fn live_series(&self) -> LiveSeries {
        lock(&self.shared.series).clone()
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    fn acquire_stream(&self, session: &mut CaptureSession) -> Result<(), CaptureError> {
        self.ensure_engine_running()?;

        if let Some(stream) = session.stream.as_ref() {
            if stream.is_live() {
                return Ok(());
            }
        }
        if let Some(mut stale) = session.stream.take() {
            stale.stop_tracks();
        }

        let constraints = InputConstraints {
            echo_cancellation: self.config.echo_cancellation,
            noise_suppression: self.config.noise_suppression,
            auto_gain_control: self.config.auto_gain_control,
            sample_rate: Some(self.backend.sample_rate()),
        };
        let stream = self.backend.open_input(&constraints)?;
        session.sample_rate = stream.sample_rate();
        log::info!("[Capture] Microphone opened at {} Hz", session.sample_rate);
        session.stream = Some(stream);
        Ok(())
    }

    fn begin_attempt(&self, session: &mut CaptureSession) -> Result<(), CaptureError> {
        session.attempt = session.attempt.wrapping_add(1);
        self.acquire_stream(session)?;
        session.format = negotiate_format(self.backend.as_ref());

        let tap = session
            .stream
            .as_ref()
            .map(|stream| stream.tap())
            .ok_or(CaptureError::DeviceNotFound)?;

        let (device, recorder_channels) =
            BufferPool::new(self.config.buffer_pool_size, self.config.buffer_size)?.split();
        let attachment = tap.attach(device)?;

        let shared = &self.shared;
        shared.analyser.reset();
        shared.analyser.connect();
        lock(&shared.series).clear();
        shared.recording.store(true, Ordering::SeqCst);

        let clock = self.backend.clock();
        let started_at = clock.now();
        session.started_at = Some(started_at);

        session.recorder = Some(Recorder::start(
            recorder_channels,
            tap,
            attachment,
            Arc::clone(&shared.analyser),
            Duration::from_millis(self.config.chunk_interval_ms.max(1)),
        )?);

        session.live_loop = Some(LiveAnalysisLoop::start(
            LiveLoopContext {
                node: Arc::clone(&shared.analyser),
                recording: Arc::clone(&shared.recording),
                series: Arc::clone(&shared.series),
                publisher: Some(shared.channels.init_live_samples()),
                clock,
                started_at,
            },
            &self.config,
        ));
        Ok(())
    }

    fn lock_session(&self) -> MutexGuard<'_, CaptureSession> {
        self.shared.lock_session()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::StubBackend;

    fn controller() -> (Arc<StubBackend>, CaptureController) {
        let backend = Arc::new(StubBackend::new());
        let config = CaptureConfig {
            fft_size: 256,
            chunk_interval_ms: 20,
            buffer_size: 160,
            ..CaptureConfig::default()
        };
        let controller = CaptureController::new(backend.clone(), config);
        (backend, controller)
    }

    #[test]
    fn test_second_start_is_a_silent_no_op() {
        let (backend, controller) = controller();
        controller.start_recording().unwrap();
        controller.start_recording().unwrap();
        assert!(controller.is_recording());
        assert_eq!(backend.open_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_benign() {
        let (_backend, controller) = controller();
        assert!(controller.stop_recording().await.unwrap().is_none());
        assert_eq!(controller.state(), RecorderState::Idle);
    }

    #[test]
    fn test_start_failure_resets_to_idle() {
        let (backend, controller) = controller();
        backend.fail_next_open(CaptureError::PermissionDenied);

        assert_eq!(
            controller.start_recording(),
            Err(CaptureError::PermissionDenied)
        );
        assert_eq!(controller.state(), RecorderState::Idle);
        assert!(!controller.has_stream());

        controller.start_recording().unwrap();
        assert!(controller.is_recording());
    }

    #[test]
    fn test_suspended_engine_needs_gesture() {
        let (backend, controller) = controller();
        backend.suspend();
        backend.set_resume_allowed(false);

        assert_eq!(
            controller.start_recording(),
            Err(CaptureError::NeedsUserGesture)
        );
        assert!(controller.is_waiting_for_gesture());

        backend.set_resume_allowed(true);
        assert_eq!(controller.notify_user_gesture(), Ok(true));
        assert_eq!(controller.notify_user_gesture(), Ok(false));
        controller.start_recording().unwrap();
    }

    #[test]
    fn test_closed_engine_is_not_running() {
        let (backend, controller) = controller();
        backend.close();
        assert_eq!(
            controller.request_microphone_access(),
            Err(CaptureError::EngineNotRunning {
                state: "closed".to_string()
            })
        );
    }

    #[test]
    fn test_microphone_constraints() {
        let (backend, controller) = controller();
        controller.request_microphone_access().unwrap();
        let constraints = backend.last_constraints().unwrap();
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
        assert!(constraints.auto_gain_control);
        assert_eq!(constraints.sample_rate, Some(8000));
    }

    #[test]
    fn test_cleanup_without_stop_tracks_keeps_stream() {
        let (backend, controller) = controller();
        controller.start_recording().unwrap();
        controller.cleanup(false);

        assert_eq!(controller.state(), RecorderState::Idle);
        assert!(controller.has_stream());
        controller.start_recording().unwrap();
        assert_eq!(backend.open_count(), 1);

        controller.cleanup(true);
        assert!(!controller.has_stream());
    }
}
