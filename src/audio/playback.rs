// Review playback of a finalized recording
//
// The recording is only read: a failed playback never alters it.

use std::sync::Arc;

use super::finalizer::{decode, RecordedAudio};
use crate::config::PlaybackConfig;
use crate::engine::backend::{AudioBackend, EngineState};
use crate::error::{log_playback_error, PlaybackError};

/// Play `recorded` on the backend's output
///
/// Uses the decoded buffer when present and otherwise tries to decode the
/// bytes. Blocking device work runs on the blocking pool.
pub async fn play_recording(
    recorded: &RecordedAudio,
    backend: Arc<dyn AudioBackend>,
    config: &PlaybackConfig,
) -> Result<(), PlaybackError> {
    let result = play_inner(recorded, backend, config).await;
    if let Err(err) = &result {
        log_playback_error(err, "play_recording");
    }
    result
}

async fn play_inner(
    recorded: &RecordedAudio,
    backend: Arc<dyn AudioBackend>,
    config: &PlaybackConfig,
) -> Result<(), PlaybackError> {
    if recorded.is_empty() || recorded.url.is_empty() {
        return Err(PlaybackError::NoRecording);
    }

    if backend.engine_state() == EngineState::Suspended {
        backend
            .resume()
            .map_err(|e| PlaybackError::OutputUnavailable {
                reason: e.to_string(),
            })?;
    }

    let buffer = match &recorded.buffer {
        Some(buffer) => buffer.clone(),
        None => decode(&recorded.bytes, recorded.format)
            .map_err(|reason| PlaybackError::StreamFailed { reason })?,
    };
    if buffer.samples.is_empty() {
        return Err(PlaybackError::NoRecording);
    }

    let gain = config.gain();
    log::info!(
        "[Playback] Playing {} ({:.2}s, gain {:.2})",
        recorded.url,
        buffer.duration(),
        gain
    );

    tokio::task::spawn_blocking(move || backend.play(&buffer.samples, buffer.sample_rate, gain))
        .await
        .map_err(|_| PlaybackError::Interrupted)?
}
