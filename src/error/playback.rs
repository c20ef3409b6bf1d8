// Playback error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Playback error code constants
///
/// Error code range: 2001-2004
pub struct PlaybackErrorCodes;

impl PlaybackErrorCodes {
    /// Nothing playable was supplied
    pub const NO_RECORDING: i32 = 2001;

    /// Output device could not be opened
    pub const OUTPUT_UNAVAILABLE: i32 = 2002;

    /// Output stream failed mid-playback
    pub const STREAM_FAILED: i32 = 2003;

    /// Playback was stopped before the end of the recording
    pub const INTERRUPTED: i32 = 2004;
}

/// Log a playback error with structured context
pub fn log_playback_error(err: &PlaybackError, context: &str) {
    error!(
        "Playback error in {}: code={}, component=Playback, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while reviewing a finalized recording
///
/// Playback is aborted and its resources released; the recording itself
/// is never touched.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Recording is empty or has no playable reference
    NoRecording,

    /// Output device missing or refused
    OutputUnavailable { reason: String },

    /// Output stream reported an error
    StreamFailed { reason: String },

    /// Playback stopped early
    Interrupted,
}

impl ErrorCode for PlaybackError {
    fn code(&self) -> i32 {
        match self {
            PlaybackError::NoRecording => PlaybackErrorCodes::NO_RECORDING,
            PlaybackError::OutputUnavailable { .. } => PlaybackErrorCodes::OUTPUT_UNAVAILABLE,
            PlaybackError::StreamFailed { .. } => PlaybackErrorCodes::STREAM_FAILED,
            PlaybackError::Interrupted => PlaybackErrorCodes::INTERRUPTED,
        }
    }

    fn message(&self) -> String {
        match self {
            PlaybackError::NoRecording => {
                "Invalid recording, nothing to play back.".to_string()
            }
            PlaybackError::OutputUnavailable { reason } => {
                format!("Audio output unavailable: {}", reason)
            }
            PlaybackError::StreamFailed { reason } => {
                format!("Playback failed: {}", reason)
            }
            PlaybackError::Interrupted => "Playback was interrupted.".to_string(),
        }
    }
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlaybackError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PlaybackError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_error_codes() {
        assert_eq!(PlaybackError::NoRecording.code(), 2001);
        assert_eq!(
            PlaybackError::OutputUnavailable {
                reason: "x".to_string()
            }
            .code(),
            2002
        );
        assert_eq!(
            PlaybackError::StreamFailed {
                reason: "x".to_string()
            }
            .code(),
            2003
        );
        assert_eq!(PlaybackError::Interrupted.code(), 2004);
    }

    #[test]
    fn test_playback_error_message() {
        let err = PlaybackError::OutputUnavailable {
            reason: "no speakers".to_string(),
        };
        assert!(err.message().contains("no speakers"));
        assert!(format!("{}", err).contains("2002"));
    }
}
