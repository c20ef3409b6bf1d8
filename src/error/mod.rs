// Error types for the foley dubbing core
//
// This module defines custom error types for capture, playback and submission,
// providing structured error handling with stable numeric codes so the game
// layer can map each failure to its own user-facing message.

mod capture;
mod playback;
mod submission;

pub use capture::{log_capture_error, CaptureError, CaptureErrorCodes};
pub use playback::{log_playback_error, PlaybackError, PlaybackErrorCodes};
pub use submission::{log_submission_error, SubmissionError, SubmissionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the boundary with the surrounding game layer.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
