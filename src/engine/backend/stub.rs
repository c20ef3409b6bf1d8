use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::format::RecordingFormat;
use crate::audio::tap::StreamTap;
use crate::error::{CaptureError, PlaybackError};
use crate::testing::signals::{Signal, SignalGenerator};

use super::{AudioBackend, EngineState, InputConstraints, InputStream, SystemTimeSource, TimeSource};

const STUB_SAMPLE_RATE: u32 = 8_000;
const STUB_BLOCK_SIZE: usize = 160;

/// One call to [`AudioBackend::play`] on the stub
#[derive(Debug, Clone, PartialEq)]
pub struct PlayedAudio {
    pub frames: usize,
    pub sample_rate: u32,
    pub gain: f32,
}

struct LiveStreamHandle {
    tap: Arc<StreamTap>,
    live: Arc<AtomicBool>,
}

/// Scripted backend used for deterministic testing and CLI tooling.
///
/// Every input stream it opens runs a small thread that feeds a synthetic
/// [`Signal`] into the stream tap in real time, so the recorder, the live
/// analysis loop and the finalizer all run exactly as they would on a
/// device.
pub struct StubBackend {
    state: Mutex<EngineState>,
    resume_allowed: AtomicBool,
    next_open_error: Mutex<Option<CaptureError>>,
    supported_formats: Mutex<HashSet<RecordingFormat>>,
    signal: Mutex<Signal>,
    input_enabled: Arc<AtomicBool>,
    sample_rate: u32,
    block_size: usize,
    clock: Mutex<Arc<dyn TimeSource>>,
    open_count: AtomicUsize,
    last_constraints: Mutex<Option<InputConstraints>>,
    last_stream: Mutex<Option<LiveStreamHandle>>,
    playback_error: Mutex<Option<PlaybackError>>,
    played: Mutex<Vec<PlayedAudio>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_sample_rate(STUB_SAMPLE_RATE)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            state: Mutex::new(EngineState::Running),
            resume_allowed: AtomicBool::new(true),
            next_open_error: Mutex::new(None),
            supported_formats: Mutex::new(
                [
                    RecordingFormat::WavFloat,
                    RecordingFormat::WavPcm,
                    RecordingFormat::L16,
                    RecordingFormat::Wav,
                ]
                .into_iter()
                .collect(),
            ),
            signal: Mutex::new(Signal::default()),
            input_enabled: Arc::new(AtomicBool::new(true)),
            sample_rate: sample_rate.max(1),
            block_size: STUB_BLOCK_SIZE,
            clock: Mutex::new(Arc::new(SystemTimeSource::default())),
            open_count: AtomicUsize::new(0),
            last_constraints: Mutex::new(None),
            last_stream: Mutex::new(None),
            playback_error: Mutex::new(None),
            played: Mutex::new(Vec::new()),
        }
    }

    /// Put the engine in the suspended state
    pub fn suspend(&self) {
        *lock(&self.state) = EngineState::Suspended;
    }

    pub fn close(&self) {
        *lock(&self.state) = EngineState::Closed;
    }

    /// Whether `resume()` succeeds (it does by default)
    pub fn set_resume_allowed(&self, allowed: bool) {
        self.resume_allowed.store(allowed, Ordering::SeqCst);
    }

    /// Make the next `open_input` fail with `err`
    pub fn fail_next_open(&self, err: CaptureError) {
        *lock(&self.next_open_error) = Some(err);
    }

    pub fn set_supported_formats(&self, formats: &[RecordingFormat]) {
        *lock(&self.supported_formats) = formats.iter().copied().collect();
    }

    /// Signal fed into streams opened from now on
    pub fn set_signal(&self, signal: Signal) {
        *lock(&self.signal) = signal;
    }

    /// Whether input streams deliver samples at all
    ///
    /// Applies to open streams too. A disabled stream stays live but the
    /// tap never receives a block, like a muted device.
    pub fn set_input_enabled(&self, enabled: bool) {
        self.input_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_clock(&self, clock: Arc<dyn TimeSource>) {
        *lock(&self.clock) = clock;
    }

    /// Number of successful `open_input` calls
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<InputConstraints> {
        lock(&self.last_constraints).clone()
    }

    /// Report a device failure on the most recently opened stream
    pub fn inject_stream_error(&self, reason: &str) {
        if let Some(stream) = lock(&self.last_stream).as_ref() {
            stream.tap.report_error(reason);
        }
    }

    /// Simulate the device going away; the stream reports not live
    pub fn end_stream(&self) {
        if let Some(stream) = lock(&self.last_stream).as_ref() {
            stream.live.store(false, Ordering::SeqCst);
        }
    }

    pub fn fail_playback(&self, err: PlaybackError) {
        *lock(&self.playback_error) = Some(err);
    }

    pub fn played(&self) -> Vec<PlayedAudio> {
        lock(&self.played).clone()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for StubBackend {
    fn engine_state(&self) -> EngineState {
        *lock(&self.state)
    }

    fn resume(&self) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        match *state {
            EngineState::Running => Ok(()),
            EngineState::Closed => Err(CaptureError::EngineNotRunning {
                state: EngineState::Closed.to_string(),
            }),
            EngineState::Suspended => {
                if self.resume_allowed.load(Ordering::SeqCst) {
                    *state = EngineState::Running;
                    Ok(())
                } else {
                    Err(CaptureError::NeedsUserGesture)
                }
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn open_input(
        &self,
        constraints: &InputConstraints,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        if let Some(err) = lock(&self.next_open_error).take() {
            return Err(err);
        }

        *lock(&self.last_constraints) = Some(constraints.clone());
        let sample_rate = constraints.sample_rate.unwrap_or(self.sample_rate);
        let signal = lock(&self.signal).clone();
        let stream = StubInputStream::start(
            signal,
            sample_rate,
            self.block_size,
            Arc::clone(&self.input_enabled),
        )?;

        *lock(&self.last_stream) = Some(LiveStreamHandle {
            tap: stream.tap(),
            live: Arc::clone(&stream.live),
        });
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(stream))
    }

    fn supports_format(&self, format: &RecordingFormat) -> bool {
        lock(&self.supported_formats).contains(format)
    }

    fn clock(&self) -> Arc<dyn TimeSource> {
        Arc::clone(&lock(&self.clock))
    }

    fn play(&self, samples: &[f32], sample_rate: u32, gain: f32) -> Result<(), PlaybackError> {
        if let Some(err) = lock(&self.playback_error).take() {
            return Err(err);
        }
        lock(&self.played).push(PlayedAudio {
            frames: samples.len(),
            sample_rate,
            gain,
        });
        Ok(())
    }
}

/// Stream that writes a synthetic signal into its tap in real time
struct StubInputStream {
    tap: Arc<StreamTap>,
    sample_rate: u32,
    live: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StubInputStream {
    fn start(
        signal: Signal,
        sample_rate: u32,
        block_size: usize,
        enabled: Arc<AtomicBool>,
    ) -> Result<Self, CaptureError> {
        let tap = Arc::new(StreamTap::new());
        let live = Arc::new(AtomicBool::new(true));
        let running = Arc::new(AtomicBool::new(true));

        let thread_tap = Arc::clone(&tap);
        let thread_running = Arc::clone(&running);
        let block_duration =
            Duration::from_secs_f64(block_size as f64 / sample_rate.max(1) as f64);

        let handle = thread::Builder::new()
            .name("stub-input".to_string())
            .spawn(move || {
                let mut generator = SignalGenerator::new(signal, sample_rate);
                let mut block = vec![0.0; block_size];
                let start = Instant::now();
                let mut blocks_sent: u32 = 0;

                while thread_running.load(Ordering::SeqCst) {
                    generator.fill(&mut block);
                    if enabled.load(Ordering::SeqCst) {
                        thread_tap.write(&block);
                    }
                    blocks_sent = blocks_sent.saturating_add(1);

                    // Pace against the wall clock so long runs do not drift
                    let due = block_duration * blocks_sent;
                    let elapsed = start.elapsed();
                    if due > elapsed {
                        thread::sleep(due - elapsed);
                    }
                }
            })
            .map_err(|e| CaptureError::DeviceError {
                details: format!("failed to spawn stub input thread: {}", e),
            })?;

        Ok(Self {
            tap,
            sample_rate,
            live,
            running,
            handle: Some(handle),
        })
    }
}

impl InputStream for StubInputStream {
    fn tap(&self) -> Arc<StreamTap> {
        Arc::clone(&self.tap)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst) && self.running.load(Ordering::SeqCst)
    }

    fn stop_tracks(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StubInputStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// Deterministic time source for desktop runs.
///
/// Each call to `now()` advances by a fixed 10ms to guarantee monotonic
/// timestamps even when no real audio stream is active.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(10, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
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
    use crate::audio::buffer_pool::BufferPool;

    #[test]
    fn test_resume_follows_script() {
        let backend = StubBackend::new();
        backend.suspend();
        backend.set_resume_allowed(false);
        assert_eq!(backend.resume(), Err(CaptureError::NeedsUserGesture));
        assert_eq!(backend.engine_state(), EngineState::Suspended);

        backend.set_resume_allowed(true);
        assert!(backend.resume().is_ok());
        assert_eq!(backend.engine_state(), EngineState::Running);
    }

    #[test]
    fn test_open_failure_is_one_shot() {
        let backend = StubBackend::new();
        backend.fail_next_open(CaptureError::PermissionDenied);
        let constraints = InputConstraints::default();

        assert_eq!(
            backend.open_input(&constraints).err(),
            Some(CaptureError::PermissionDenied)
        );
        let mut stream = backend.open_input(&constraints).unwrap();
        assert_eq!(backend.open_count(), 1);
        stream.stop_tracks();
        assert!(!stream.is_live());
    }

    #[test]
    fn test_stream_feeds_attached_tap() {
        let backend = StubBackend::new();
        let mut stream = backend.open_input(&InputConstraints::default()).unwrap();
        let (device, mut recorder) = BufferPool::new(32, STUB_BLOCK_SIZE).unwrap().split();
        stream.tap().attach(device).unwrap();

        thread::sleep(Duration::from_millis(100));
        stream.stop_tracks();

        let mut received = 0;
        while let Ok(block) = recorder.data_consumer.pop() {
            received += block.len();
        }
        assert!(received > 0);
    }

    #[test]
    fn test_disabled_input_delivers_nothing() {
        let backend = StubBackend::new();
        backend.set_input_enabled(false);
        let mut stream = backend.open_input(&InputConstraints::default()).unwrap();
        let (device, mut recorder) = BufferPool::new(32, STUB_BLOCK_SIZE).unwrap().split();
        stream.tap().attach(device).unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(stream.is_live());
        stream.stop_tracks();
        assert!(recorder.data_consumer.pop().is_err());
    }

    #[test]
    fn test_stub_time_source_advances() {
        let clock = StubTimeSource::new();
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, Duration::from_millis(10));
    }
}
