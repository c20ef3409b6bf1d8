// LevelSession: one player's visit to one level
//
// Owns the capture controller for the level, the item selection, the cue
// alert tracker and the last finalized recording. Recording stops by itself
// after the level duration (capped by the configured maximum), and leave()
// tears everything down without surfacing errors.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::cues::{CueAlert, CueAlertTracker};
use super::progress::PlayerProgress;
use super::submission::{submit_dubbing, Submission, SubmissionOutcome};
use crate::audio::{play_recording, RecordedAudio};
use crate::catalog::{Catalog, ItemId, Level};
use crate::config::AppConfig;
use crate::engine::backend::AudioBackend;
use crate::engine::capture::{CaptureController, RecorderState};
use crate::error::{log_capture_error, CaptureError, PlaybackError, SubmissionError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// What changed since the previous [`LevelSession::tick`]
#[derive(Debug, Default)]
pub struct SessionTick {
    pub elapsed_secs: f32,
    pub alerts: Vec<CueAlert>,
    pub current_cue: Option<usize>,
    /// Set when the recorder failed since the last tick
    pub capture_error: Option<CaptureError>,
}

/// The armed auto-stop timer
///
/// Disarming only interrupts the wait. A timer that already began stopping
/// the recording runs to completion, so its artifact is never lost.
struct AutoStop {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl AutoStop {
    /// Cancel the wait and let the task finish whatever it started
    async fn disarm(self) {
        let _ = self.cancel.send(());
        if let Err(err) = self.handle.await {
            log::warn!("[Session] Auto-stop task failed: {}", err);
        }
    }
}

pub struct LevelSession {
    level: Level,
    catalog: Arc<Catalog>,
    config: AppConfig,
    backend: Arc<dyn AudioBackend>,
    capture: Arc<CaptureController>,
    selected: Vec<ItemId>,
    cue_tracker: CueAlertTracker,
    last_recording: Arc<Mutex<Option<RecordedAudio>>>,
    playing: Arc<AtomicBool>,
    auto_stop: Option<AutoStop>,
}

impl LevelSession {
    pub fn new(
        level: Level,
        catalog: Arc<Catalog>,
        backend: Arc<dyn AudioBackend>,
        config: AppConfig,
    ) -> Self {
        let capture = Arc::new(CaptureController::new(
            Arc::clone(&backend),
            config.capture.clone(),
        ));
        let cue_tracker = CueAlertTracker::new(&level.cues, &config.game);
        log::info!("[Session] Entered level {} ({})", level.id, level.title);

        Self {
            level,
            catalog,
            config,
            backend,
            capture,
            selected: Vec::new(),
            cue_tracker,
            last_recording: Arc::new(Mutex::new(None)),
            playing: Arc::new(AtomicBool::new(false)),
            auto_stop: None,
        }
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn capture(&self) -> &Arc<CaptureController> {
        &self.capture
    }

    pub fn selected_items(&self) -> &[ItemId] {
        &self.selected
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Recording, finalizing or playing back
    pub fn is_busy(&self) -> bool {
        matches!(
            self.capture.state(),
            RecorderState::Recording | RecorderState::Stopping
        ) || self.is_playing()
    }

    /// Seconds after which a recording stops by itself
    pub fn auto_stop_after(&self) -> Duration {
        let secs = self
            .level
            .duration_secs
            .min(self.config.game.max_recording_secs)
            .max(0.0);
        Duration::try_from_secs_f32(secs).unwrap_or(Duration::ZERO)
    }

    /// Select or deselect an item
    ///
    /// Returns whether the item is selected afterwards. The selection is
    /// locked while recording or playing.
    pub fn toggle_item(&mut self, id: &ItemId) -> Result<bool, SubmissionError> {
        if self.is_busy() {
            return Err(SubmissionError::Busy);
        }
        if !self.catalog.contains_item(id.as_str()) {
            return Err(SubmissionError::UnknownItem { id: id.to_string() });
        }
        if let Some(index) = self.selected.iter().position(|selected| selected == id) {
            self.selected.remove(index);
            return Ok(false);
        }
        let max = self.config.game.max_selected_items;
        if self.selected.len() >= max {
            return Err(SubmissionError::TooManyItems {
                max,
                selected: self.selected.len() + 1,
            });
        }
        self.selected.push(id.clone());
        Ok(true)
    }

    /// Start recording and arm the auto-stop timer
    ///
    /// The timer needs a tokio runtime; without one the recording only
    /// stops when asked to.
    pub fn start_recording(&mut self) -> Result<(), CaptureError> {
        if self.is_playing() {
            return Err(CaptureError::RecorderFailed {
                reason: "playback in progress".to_string(),
            });
        }
        if self.capture.is_recording() {
            return Ok(());
        }

        self.capture.start_recording()?;
        *lock(&self.last_recording) = None;
        self.cue_tracker.reset();
        self.arm_auto_stop();
        Ok(())
    }

    /// Stop recording and keep the finalized artifact
    ///
    /// When the auto-stop timer already stopped the recording, or is busy
    /// stopping it, its artifact is returned.
    pub async fn stop_recording(&mut self) -> Result<Option<RecordedAudio>, CaptureError> {
        if let Some(auto_stop) = self.auto_stop.take() {
            auto_stop.disarm().await;
        }
        match self.capture.stop_recording().await? {
            Some(recorded) => {
                *lock(&self.last_recording) = Some(recorded.clone());
                Ok(Some(recorded))
            }
            None => Ok(lock(&self.last_recording).clone()),
        }
    }

    pub fn last_recording(&self) -> Option<RecordedAudio> {
        lock(&self.last_recording).clone()
    }

    /// Advance cue alerts and check recorder health; call once per frame
    pub fn tick(&mut self) -> SessionTick {
        if !self.capture.is_recording() {
            return SessionTick::default();
        }
        let capture_error = self.capture.poll_recorder_health();
        if capture_error.is_some() {
            // Dropping the sender ends the wait; nothing is left to stop
            self.auto_stop = None;
        }
        let elapsed_secs = self.capture.elapsed_secs();
        SessionTick {
            elapsed_secs,
            alerts: self.cue_tracker.update(elapsed_secs),
            current_cue: self.cue_tracker.current_cue(elapsed_secs),
            capture_error,
        }
    }

    /// Play back the last recording
    pub async fn play_last_recording(&self) -> Result<(), PlaybackError> {
        let recorded = self.last_recording().ok_or(PlaybackError::NoRecording)?;
        if self.playing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = play_recording(&recorded, Arc::clone(&self.backend), &self.config.playback).await;
        self.playing.store(false, Ordering::SeqCst);
        result
    }

    /// Score the last recording against this level
    pub fn submit<R: Rng + ?Sized>(
        &self,
        progress: &mut PlayerProgress,
        rng: &mut R,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let recording = self.last_recording();
        submit_dubbing(
            Submission {
                level: &self.level,
                recording: recording.as_ref(),
                selected: &self.selected,
                busy: self.is_busy(),
            },
            progress,
            &self.catalog,
            &self.config,
            rng,
        )
    }

    /// Stop everything and release the microphone
    ///
    /// Errors are logged and swallowed; the player has already left.
    pub async fn leave(mut self) {
        if let Some(auto_stop) = self.auto_stop.take() {
            auto_stop.disarm().await;
        }
        if self.capture.state() == RecorderState::Recording {
            if let Err(err) = self.capture.stop_recording().await {
                log::warn!("[Session] Ignoring error while leaving level: {}", err);
            }
        }
        self.capture.cleanup(true);
        log::info!("[Session] Left level {}", self.level.id);
    }

    fn arm_auto_stop(&mut self) {
        self.auto_stop = None;
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!("[Session] No async runtime, auto-stop disabled");
                return;
            }
        };

        let delay = self.auto_stop_after();
        let capture = Arc::clone(&self.capture);
        let last_recording = Arc::clone(&self.last_recording);
        let (cancel, cancelled) = oneshot::channel::<()>();
        let handle = runtime.spawn(async move {
            // A send or a dropped sender both end the wait early
            if tokio::time::timeout(delay, cancelled).await.is_ok() {
                return;
            }
            log::info!("[Session] Maximum recording time reached, stopping");
            match capture.stop_recording().await {
                Ok(Some(recorded)) => *lock(&last_recording) = Some(recorded),
                Ok(None) => {}
                Err(err) => log_capture_error(&err, "auto_stop"),
            }
        });
        self.auto_stop = Some(AutoStop { cancel, handle });
    }
}
