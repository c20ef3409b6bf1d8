//! Backend abstractions for the capture core.
//!
//! The capture controller never talks to an audio API directly. It asks an
//! [`AudioBackend`] for the engine state, for an input stream and for a
//! clock, so the same state machine runs against real hardware (cpal) and
//! against the deterministic [`StubBackend`] used by tests and the CLI.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::audio::format::RecordingFormat;
use crate::audio::tap::StreamTap;
use crate::error::{CaptureError, PlaybackError};

/// Lifecycle state of the audio engine (the browser's audio context analogue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Suspended,
    Running,
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Suspended => "suspended",
            EngineState::Running => "running",
            EngineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Processing requested when opening the microphone.
///
/// Backends that cannot honour a flag treat it as advisory.
#[derive(Debug, Clone, PartialEq)]
pub struct InputConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Preferred sample rate, normally the engine's own rate
    pub sample_rate: Option<u32>,
}

impl Default for InputConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: None,
        }
    }
}

/// A live hardware input stream.
///
/// The stream outlives individual recording attempts: the recorder attaches
/// its channels to [`InputStream::tap`] when it starts and detaches them when
/// it stops, while the device keeps running until [`InputStream::stop_tracks`].
pub trait InputStream: Send {
    /// Tap the device callback writes into
    fn tap(&self) -> Arc<StreamTap>;

    /// Sample rate of the delivered mono samples
    fn sample_rate(&self) -> u32;

    /// False once the tracks were stopped or the device went away
    fn is_live(&self) -> bool;

    /// Stop the device and release it; idempotent
    fn stop_tracks(&mut self);
}

/// Trait implemented by platform audio backends.
pub trait AudioBackend: Send + Sync {
    fn engine_state(&self) -> EngineState;

    /// Try to move a suspended engine to running
    ///
    /// Fails when the platform requires a user interaction first.
    fn resume(&self) -> Result<(), CaptureError>;

    fn sample_rate(&self) -> u32;

    fn open_input(
        &self,
        constraints: &InputConstraints,
    ) -> Result<Box<dyn InputStream>, CaptureError>;

    /// Whether the recording container can be produced on this backend
    fn supports_format(&self, format: &RecordingFormat) -> bool;

    /// Clock of the audio subsystem; live samples are timestamped with it
    fn clock(&self) -> Arc<dyn TimeSource>;

    /// Play mono samples on the default output, blocking until done
    fn play(&self, samples: &[f32], sample_rate: u32, gain: f32) -> Result<(), PlaybackError>;
}

/// Trait representing a monotonic time source.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use self::cpal::CpalBackend;

mod stub;
pub use stub::{PlayedAudio, StubBackend, StubTimeSource};
